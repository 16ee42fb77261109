use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber for a shmheap binary.
///
/// Filtering follows `RUST_LOG` and defaults to "info". Development gets
/// pretty output on stderr so it never mixes with command output on stdout;
/// production gets one JSON object per line.
///
/// The OpenTelemetry layer forwards spans to whatever global tracer provider
/// the host process installed, and is inert otherwise.
pub fn setup_logging(environment: Environment) {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(opentelemetry::global::tracer("shmheap"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        Environment::Development => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_ansi(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
    tracing::debug!(environment = environment.as_str(), "Logging initialised");
}
