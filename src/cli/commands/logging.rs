use clap::{Arg, ArgAction, ArgMatches, Command, builder::ValueParser};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

// Index is the `-v` count that selects the level.
const LEVELS: [(&str, Level); 5] = [
    ("error", Level::ERROR),
    ("warn", Level::WARN),
    ("info", Level::INFO),
    ("debug", Level::DEBUG),
    ("trace", Level::TRACE),
];

/// Accepts a `-v` count or a level name from `COURSEGATE_LOG_LEVEL`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|level: &str| -> std::result::Result<u8, String> {
        if let Ok(count) = level.parse::<u8>() {
            if usize::from(count) <= LEVELS.len() {
                return Ok(count);
            }
        }

        LEVELS
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(level))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level '{level}'"))
    })
}

/// Level picked on the command line, `None` when nothing was asked for.
#[must_use]
pub fn verbosity(matches: &ArgMatches) -> Option<Level> {
    match matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0) {
        0 => None,
        count => LEVELS
            .get(usize::from(count))
            .or(LEVELS.last())
            .map(|(_, level)| *level),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Raise log verbosity (-v warn, -vv info, -vvv debug, -vvvv trace)")
            .env("COURSEGATE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
