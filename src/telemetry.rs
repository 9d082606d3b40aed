use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Initializes the tracing subscriber for the embedding application.
///
/// Metrics are emitted through the `opentelemetry` global meter; installing a
/// meter provider (or leaving the no-op default) is the application's choice.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_telemetry(log_format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = Registry::default().with(filter);

    match log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
    }
}

/// Best-effort subscriber setup for tests. Safe to call from every test.
pub fn init_test_telemetry() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into());
    let _ = Registry::default().with(filter).with(tracing_subscriber::fmt::layer().with_test_writer()).try_init();
}
