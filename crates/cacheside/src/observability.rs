//! Logging bootstrap.
//!
//! Installs a `tracing` subscriber whose level filter can be swapped at
//! runtime. `RUST_LOG`, when set and valid, takes precedence over the
//! configured level at startup.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static LOG_RELOAD_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Install the global subscriber using `logging.level`.
///
/// Only the first call in a process installs a subscriber; later calls are
/// ignored.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| level_filter(&logging.level));

    let (reload_layer, handle) = reload::Layer::new(filter);
    if LOG_RELOAD_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

pub fn init_tracing_with_level(level: &str) {
    init_tracing(&LoggingConfig {
        level: level.to_string(),
    });
}

/// Replace the active level filter.
///
/// Returns `false` when the subscriber was not installed by
/// [`init_tracing`] or the filter could not be swapped.
pub fn apply_logging_level(level: &str) -> bool {
    let Some(handle) = LOG_RELOAD_HANDLE.get() else {
        return false;
    };
    match handle.reload(level_filter(level)) {
        Ok(()) => {
            tracing::info!(level = %level, "logging level changed");
            true
        }
        Err(e) => {
            tracing::warn!(level = %level, error = %e, "failed to change logging level");
            false
        }
    }
}

/// Filter for `level`, falling back to `info` for unparsable directives.
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
