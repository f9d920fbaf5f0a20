//! Global `tracing` subscriber installation.
//!
//! The filter is taken from `TFLUX_LOG` when set (same syntax as
//! `RUST_LOG`), otherwise from the default passed by the caller.

use crate::errors::{FluxError, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "TFLUX_LOG";

fn build_filter(default_filter: &str) -> Result<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| FluxError::Config(format!("invalid {LOG_ENV} value '{directives}': {e}"))),
        _ => EnvFilter::try_new(default_filter)
            .map_err(|e| FluxError::Config(format!("invalid log filter '{default_filter}': {e}"))),
    }
}

/// Installs a human readable fmt subscriber.
///
/// # Errors
///
/// Returns `Config` if the filter does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = build_filter(default_filter)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| FluxError::Config(format!("failed to install tracing subscriber: {e}")))
}

/// Installs a subscriber writing one JSON object per event.
///
/// # Errors
///
/// Same as [`init_tracing`].
pub fn init_json_tracing(default_filter: &str) -> Result<()> {
    let filter = build_filter(default_filter)?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .try_init()
        .map_err(|e| FluxError::Config(format!("failed to install tracing subscriber: {e}")))
}
