//! `tracing` subscriber setup for binaries embedding the stream driver.
//!
//! Logs go to stderr so stdout can carry the record stream.

use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Resolves the filter: explicit config, then `RUST_LOG`, then the default.
pub fn log_filter(config: &EnvConfig) -> EnvFilter {
    match config.log_filter.as_deref() {
        Some(directives) => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
        }
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    }
}

/// Installs the global subscriber. Returns `false` when one was already set.
pub fn init_logging(config: &EnvConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(config))
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = if config.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}
