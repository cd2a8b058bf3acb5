//! Log output and the optional OTLP trace exporter.
//!
//! Logs always go to stderr through `tracing-subscriber`. Spans are exported
//! over OTLP/gRPC only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

use anyhow::{Result, anyhow};
use base64::{Engine, engine::general_purpose};
use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
};
use std::{collections::HashMap, env::var, time::Duration};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Exporter settings read from the standard `OTEL_*` variables.
#[derive(Debug, PartialEq, Eq)]
struct ExporterSettings {
    endpoint: String,
    headers: HashMap<String, String>,
    instance_id: String,
}

impl ExporterSettings {
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(protocol) = lookup("OTEL_EXPORTER_OTLP_PROTOCOL") {
            if protocol != "grpc" {
                debug!("OTEL_EXPORTER_OTLP_PROTOCOL='{protocol}' ignored: only 'grpc' is supported");
            }
        }

        let endpoint = normalize_endpoint(
            lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string()),
        );
        let headers = lookup("OTEL_EXPORTER_OTLP_HEADERS")
            .map(|raw| parse_headers_env(&raw))
            .unwrap_or_default();
        let instance_id =
            lookup("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|| Ulid::new().to_string());

        Self {
            endpoint,
            headers,
            instance_id,
        }
    }

    fn from_env() -> Self {
        Self::from_lookup(|key| var(key).ok())
    }
}

fn parse_headers_env(headers_str: &str) -> HashMap<String, String> {
    headers_str
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

// Keys ending in "-bin" are binary metadata and carry base64 values.
fn headers_to_metadata(headers: &HashMap<String, String>) -> Result<MetadataMap> {
    let mut meta = MetadataMap::with_capacity(headers.len());

    for (key, value) in headers {
        let key_str = key.to_ascii_lowercase();

        if key_str.ends_with("-bin") {
            let bytes = general_purpose::STANDARD
                .decode(value.as_bytes())
                .map_err(|e| anyhow!("failed to base64-decode value for key {key_str}: {e}"))?;
            let key = MetadataKey::<Binary>::from_bytes(key_str.as_bytes())
                .map_err(|e| anyhow!("invalid binary metadata key {key_str}: {e}"))?;
            meta.insert_bin(key, MetadataValue::from_bytes(&bytes));
        } else {
            let key = MetadataKey::<Ascii>::from_bytes(key_str.as_bytes())
                .map_err(|e| anyhow!("invalid ASCII metadata key {key_str}: {e}"))?;
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|e| anyhow!("invalid ASCII metadata value for key {key_str}: {e}"))?;
            meta.insert(key, value);
        }
    }

    Ok(meta)
}

fn normalize_endpoint(endpoint: String) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

/// Host to verify against when the collector is reached over TLS.
fn tls_domain(endpoint: &str) -> Option<&str> {
    endpoint
        .strip_prefix("https://")
        .and_then(|rest| rest.split('/').next())
        .and_then(|authority| authority.split(':').next())
        .filter(|host| !host.is_empty())
}

fn init_tracer(settings: ExporterSettings) -> Result<Tracer> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&settings.endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(Duration::from_secs(3));

    if let Some(host) = tls_domain(&settings.endpoint) {
        let tls = ClientTlsConfig::new()
            .domain_name(host.to_string())
            .with_native_roots();
        builder = builder.with_tls_config(tls);
    }

    if !settings.headers.is_empty() {
        builder = builder.with_metadata(headers_to_metadata(&settings.headers)?);
    }

    let exporter = builder.build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(vec![
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", settings.instance_id),
                ])
                .build(),
        )
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

/// Initialize logging and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, the
/// OTLP span exporter. `RUST_LOG` overrides the verbosity-derived default.
///
/// # Errors
///
/// Returns an error if tracer or subscriber initialization fails
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let verbosity_level = verbosity_level.unwrap_or(Level::ERROR);

    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false)
        .with_writer(std::io::stderr);

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = init_tracer(ExporterSettings::from_env())?;
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(otel_layer)
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Flush and stop the tracer provider. Noop when tracing was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}
