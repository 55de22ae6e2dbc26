use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::{AppError, Result};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Plain stderr logging. Used by tests and tools that never export spans.
pub fn init_logging(default_level: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .init();
}

/// Installs the global subscriber for a service. When `otlp` is set and the
/// `otel` feature is compiled in, spans are also shipped to the OTLP collector
/// configured through the standard `OTEL_EXPORTER_OTLP_*` variables.
pub fn init_tracing(service_name: &str, default_level: &str, otlp: bool) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let registry = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "otel")]
    {
        if otlp {
            let tracer = otel::tracer(service_name)?;
            return registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()
                .map_err(AppError::tracing);
        }
    }

    registry.try_init().map_err(AppError::tracing)?;

    #[cfg(not(feature = "otel"))]
    if otlp {
        tracing::warn!(
            service = service_name,
            "otlp export requested but the otel feature is disabled"
        );
    }
    Ok(())
}

pub fn shutdown_tracer_provider() {
    #[cfg(feature = "otel")]
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(feature = "otel")]
mod otel {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace::{self as sdktrace, Tracer};
    use opentelemetry_sdk::{runtime, Resource};

    use crate::errors::{AppError, Result};

    pub(super) fn tracer(service_name: &str) -> Result<Tracer> {
        opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", service_name.to_string()),
            ])))
            .install_batch(runtime::Tokio)
            .map_err(AppError::tracing)
    }
}
