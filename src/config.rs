//! Environment configuration.

use std::env;
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "RUN_STREAM_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "RUN_STREAM_TIMEOUT_SECS";
pub const ENV_LOG: &str = "RUN_STREAM_LOG";
pub const ENV_LOG_JSON: &str = "RUN_STREAM_LOG_JSON";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Base URL of the agent server.
    pub endpoint: Option<String>,
    /// Whole-request timeout.
    pub timeout: Option<Duration>,
    /// `tracing` filter directive, e.g. `run_stream=debug`.
    pub log_filter: Option<String>,
    pub log_json: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env_string_opt(ENV_ENDPOINT),
            timeout: env_string_opt(ENV_TIMEOUT_SECS)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            log_filter: env_string_opt(ENV_LOG),
            log_json: env_flag(ENV_LOG_JSON),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
