//! OpenTelemetry integration for tracing and structured logging.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use opentelemetry_stdout::SpanExporter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Settings for the tracing subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to exported spans
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "tempera_storage=debug")
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable text
    pub json_logs: bool,
    /// Export spans to stdout through OpenTelemetry
    pub export_spans: bool,
}

impl TelemetryConfig {
    /// Create a configuration for the given service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: "info".to_string(),
            json_logs: false,
            export_spans: false,
        }
    }

    /// Set the fallback log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON-formatted logs.
    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }

    /// Enable the OpenTelemetry stdout span exporter.
    pub fn with_span_export(mut self, enabled: bool) -> Self {
        self.export_spans = enabled;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new("tempera")
    }
}

/// Initialize tracing with the default configuration.
///
/// Respects the `RUST_LOG` environment variable.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_telemetry() -> Result<(), Box<dyn std::error::Error>> {
    init_telemetry_with_config(TelemetryConfig::default())
}

/// Initialize tracing with a custom configuration.
///
/// Installs a text or JSON fmt layer and, when `export_spans` is set, an
/// OpenTelemetry layer exporting spans to stdout.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_telemetry_with_config(
    config: TelemetryConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let telemetry_layer = if config.export_spans {
        let provider = TracerProvider::builder()
            .with_simple_exporter(SpanExporter::default())
            .with_id_generator(RandomIdGenerator::default())
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                config.service_name.clone(),
            )]))
            .build();
        let tracer = provider.tracer("tempera");
        opentelemetry::global::set_tracer_provider(provider);
        Some(
            tracing_opentelemetry::layer()
                .with_tracer(tracer)
                .with_filter(config.filter()),
        )
    } else {
        None
    };

    let json_layer = config.json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(config.filter())
    });

    let text_layer = (!config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_filter(config.filter())
    });

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    tracing::debug!(
        service = %config.service_name,
        json = config.json_logs,
        spans = config.export_spans,
        "Telemetry initialized"
    );
    Ok(())
}

/// Shutdown OpenTelemetry and flush pending spans.
///
/// Call this before application exit to ensure all spans are exported.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
