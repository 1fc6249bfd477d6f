//! Logging and trace export for modelgate
//!
//! Installs a `tracing` subscriber with console output and, when an OTLP
//! exporter is configured, ships spans through `tracing-opentelemetry`.

use modelgate_config::{ExportProtocol, ExporterConfig, LogFormat, TelemetryConfig};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_semantic_conventions::resource as semconv;

/// Guard that flushes and shuts down trace export on drop
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shutdown tracer provider: {e}");
        }
    }
}

/// Initialize logging and optional trace export
///
/// Log lines go to stderr so command output on stdout stays clean.
/// `log_filter` is an `EnvFilter` directive such as `info` or
/// `modelgate_runtime=debug`; an invalid directive falls back to `info`.
/// The returned guard must be held for the lifetime of the process.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be built or a global
/// subscriber is already installed
pub fn init(config: Option<&TelemetryConfig>, log_filter: &str) -> anyhow::Result<TelemetryGuard> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let defaults = TelemetryConfig::default();
    let config = config.unwrap_or(&defaults);
    let json = config.log_format == LogFormat::Json;

    let tracer_provider = config
        .exporter
        .as_ref()
        .map(|exporter| init_tracer(&config.service_name, exporter))
        .transpose()?;

    let otel_layer = tracer_provider.as_ref().map(|provider| {
        global::set_tracer_provider(provider.clone());
        tracing_opentelemetry::layer().with_tracer(provider.tracer("modelgate"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_target(true).with_writer(std::io::stderr)))
        .with((!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr)
        }))
        .with(otel_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(TelemetryGuard { tracer_provider })
}

/// Build the OTLP tracer provider
fn init_tracer(service_name: &str, exporter: &ExporterConfig) -> anyhow::Result<SdkTracerProvider> {
    use opentelemetry_otlp::{SpanExporter, WithExportConfig};

    let span_exporter = match exporter.protocol {
        ExportProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(exporter.endpoint.as_str())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build gRPC span exporter: {e}"))?,
        ExportProtocol::HttpProto => SpanExporter::builder()
            .with_http()
            .with_endpoint(exporter.endpoint.as_str())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP span exporter: {e}"))?,
    };

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new(semconv::SERVICE_NAME, service_name.to_owned()),
            KeyValue::new(semconv::SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler(exporter.sampling_rate))
        .with_batch_exporter(span_exporter)
        .build())
}

/// Parent-based sampler honouring the configured ratio
fn sampler(rate: f64) -> Sampler {
    let root = if rate >= 1.0 {
        Sampler::AlwaysOn
    } else if rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(rate)
    };

    Sampler::ParentBased(Box::new(root))
}
