//! Logging, tracing and metrics setup.
//!
//! Logs always go to stdout through a `fmt` layer filtered by `RUST_LOG`
//! (default `info`). With the `telemetry` feature, setting any of
//! `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_EXPORTER_OTLP_HEADERS` or
//! `OTEL_EXPORTER_OTLP_PROTOCOL` additionally exports spans and metrics over OTLP,
//! via HTTP (`http/protobuf`, the default) or gRPC (`grpc`).
//!
//! Keep the returned [`TelemetryProviders`] alive for the lifetime of the process;
//! dropping it flushes and shuts the exporters down.

use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, HttpMakeClassifier, TraceLayer};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

#[cfg(feature = "telemetry")]
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
#[cfg(feature = "telemetry")]
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
#[cfg(feature = "telemetry")]
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
#[cfg(feature = "telemetry")]
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[cfg(feature = "telemetry")]
    #[error("Failed to build OTLP exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// OTLP transport.
#[cfg(feature = "telemetry")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TelemetryProtocol {
    Http,
    Grpc,
}

#[cfg(feature = "telemetry")]
impl TelemetryProtocol {
    /// `None` unless an OTLP exporter is configured in the environment.
    fn from_env() -> Option<Self> {
        let enabled = [
            "OTEL_EXPORTER_OTLP_ENDPOINT",
            "OTEL_EXPORTER_OTLP_HEADERS",
            "OTEL_EXPORTER_OTLP_PROTOCOL",
        ]
        .iter()
        .any(|var| std::env::var(var).is_ok());
        if !enabled {
            return None;
        }
        match std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("grpc") => Some(TelemetryProtocol::Grpc),
            _ => Some(TelemetryProtocol::Http),
        }
    }
}

/// Telemetry builder.
#[derive(Debug, Clone)]
pub struct Telemetry {
    name: String,
    version: String,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Installs the global subscriber.
    pub fn register(self) -> Result<TelemetryProviders, TelemetryError> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        #[cfg(feature = "telemetry")]
        if let Some(protocol) = TelemetryProtocol::from_env() {
            let resource = self.resource();
            let tracer_provider = init_tracer_provider(protocol, resource.clone())?;
            let meter_provider = init_meter_provider(protocol, resource)?;
            let tracer = tracer_provider.tracer(self.name.clone());
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(MetricsLayer::new(meter_provider.clone()))
                .with(OpenTelemetryLayer::new(tracer))
                .try_init()?;
            tracing::info!(service = %self.name, ?protocol, "OpenTelemetry export enabled");
            return Ok(TelemetryProviders {
                tracer_provider: Some(tracer_provider),
                meter_provider: Some(meter_provider),
            });
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
        tracing::info!(service = %self.name, version = %self.version, "OpenTelemetry export disabled");
        Ok(TelemetryProviders::default())
    }

    #[cfg(feature = "telemetry")]
    fn resource(&self) -> Resource {
        let deployment_env =
            std::env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
        Resource::builder()
            .with_service_name(self.name.clone())
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_VERSION, self.version.clone()),
                    KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
                ],
                SCHEMA_URL,
            )
            .build()
    }
}

#[cfg(feature = "telemetry")]
fn init_tracer_provider(
    protocol: TelemetryProtocol,
    resource: Resource,
) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match protocol {
        TelemetryProtocol::Http => exporter.with_http().build()?,
        TelemetryProtocol::Grpc => exporter.with_tonic().build()?,
    };
    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(1.0))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

#[cfg(feature = "telemetry")]
fn init_meter_provider(
    protocol: TelemetryProtocol,
    resource: Resource,
) -> Result<SdkMeterProvider, TelemetryError> {
    use opentelemetry_sdk::metrics::Temporality;

    let exporter = opentelemetry_otlp::MetricExporter::builder();
    let exporter = match protocol {
        TelemetryProtocol::Http => exporter
            .with_http()
            .with_temporality(Temporality::default())
            .build()?,
        TelemetryProtocol::Grpc => exporter
            .with_tonic()
            .with_temporality(Temporality::default())
            .build()?,
    };
    let reader = PeriodicReader::builder(exporter)
        .with_interval(std::time::Duration::from_secs(30))
        .build();
    let stdout_reader =
        PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default()).build();
    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource)
        .with_reader(reader)
        .with_reader(stdout_reader)
        .build();
    global::set_meter_provider(meter_provider.clone());
    Ok(meter_provider)
}

/// Installed exporters, shut down on drop.
#[derive(Default)]
pub struct TelemetryProviders {
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<SdkTracerProvider>,
    #[cfg(feature = "telemetry")]
    meter_provider: Option<SdkMeterProvider>,
}

impl TelemetryProviders {
    /// Request spans for the HTTP router.
    pub fn http_tracing(&self) -> TraceLayer<HttpMakeClassifier> {
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO))
    }
}

impl Drop for TelemetryProviders {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        {
            if let Some(tracer_provider) = self.tracer_provider.take()
                && let Err(err) = tracer_provider.shutdown()
            {
                eprintln!("{err:?}");
            }
            if let Some(meter_provider) = self.meter_provider.take()
                && let Err(err) = meter_provider.shutdown()
            {
                eprintln!("{err:?}");
            }
        }
    }
}
