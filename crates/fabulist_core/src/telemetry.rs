//! Tracing and OpenTelemetry bootstrap.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use opentelemetry_stdout::SpanExporter;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Default filter directive when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable logs
    pub json: bool,
    /// Export spans through OpenTelemetry to stdout
    pub export_spans: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            export_spans: false,
        }
    }
}

impl TelemetrySettings {
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }
}

/// Initialize tracing with an optional OpenTelemetry span exporter.
///
/// `RUST_LOG` takes precedence over `settings.filter`.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_telemetry(settings: &TelemetrySettings) -> Result<(), Box<dyn std::error::Error>> {
    let fmt_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(settings.env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_filter(settings.env_filter())
            .boxed()
    };

    let telemetry_layer = if settings.export_spans {
        let provider = TracerProvider::builder()
            .with_simple_exporter(SpanExporter::default())
            .with_id_generator(RandomIdGenerator::default())
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                "fabulist",
            )]))
            .build();
        let tracer = provider.tracer("fabulist");
        opentelemetry::global::set_tracer_provider(provider);

        Some(
            tracing_opentelemetry::layer()
                .with_tracer(tracer)
                .with_filter(settings.env_filter()),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(json = settings.json, export_spans = settings.export_spans, "Telemetry initialized");
    Ok(())
}

/// Shutdown OpenTelemetry and flush pending spans.
///
/// Call this before application exit to ensure all spans are exported.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
