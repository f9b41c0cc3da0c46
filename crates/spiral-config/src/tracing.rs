use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "PRETEXT_LOG";

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Configures the global tracing subscriber with an `info` default.
pub fn init_tracing() -> Result<(), InitError> {
    init_tracing_with("info")
}

/// Configures the global tracing subscriber.
///
/// Events go to stderr so tools can keep stdout for machine-readable output.
/// The filter is read from [`LOG_ENV`], then `RUST_LOG`, then `default_filter`.
pub fn init_tracing_with(default_filter: &str) -> Result<(), InitError> {
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)?;

    let filter = resolve_filter(default_filter)?;
    let ansi = std::io::stderr().is_terminal();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(ansi);
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InitError::Subscriber(err.to_string()))
}

fn resolve_filter(default_filter: &str) -> Result<EnvFilter, InitError> {
    match std::env::var(LOG_ENV) {
        Ok(raw) if !raw.trim().is_empty() => {
            EnvFilter::try_new(raw.trim()).map_err(|err| InitError::Filter(err.to_string()))
        }
        Ok(_) | Err(std::env::VarError::NotPresent) => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter))),
        Err(err) => Err(InitError::Env(err)),
    }
}

/// Errors emitted when configuring the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("failed to read PRETEXT_LOG: {0}")]
    Env(std::env::VarError),
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("failed to install subscriber: {0}")]
    Subscriber(String),
}
