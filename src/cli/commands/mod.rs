pub mod auth;
pub mod logging;
pub mod oauth;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const CMD_SET_ROLE: &str = "set-role";
pub const ARG_IDENTITY: &str = "identity";
pub const ARG_ROLE: &str = "role";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("coursegate")
        .about("Course catalog authentication and authorization")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("COURSEGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("COURSEGATE_DSN")
                .required(true),
        )
        .subcommand(set_role_command());

    let command = auth::with_args(command);
    let command = oauth::with_args(command);
    logging::with_args(command)
}

fn set_role_command() -> Command {
    Command::new(CMD_SET_ROLE)
        .about("Grant or revoke the admin role for an existing account")
        .arg(
            Arg::new(ARG_IDENTITY)
                .long(ARG_IDENTITY)
                .help("Login identity (email) of the account")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ROLE)
                .long(ARG_ROLE)
                .help("Role to assign")
                .value_parser(["user", "admin"])
                .required(true),
        )
}
