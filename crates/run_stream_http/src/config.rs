use std::collections::BTreeMap;
use std::time::Duration;

use run_stream::EnvConfig;

use crate::retry::{BASE_DELAY, MAX_RETRIES};
use crate::url::DEFAULT_ENDPOINT;

/// Transport configuration for run stream requests.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpStreamConfig {
    /// Base URL of the agent server; run routes are appended to it.
    pub base_url: String,
    /// Optional `user-agent` override.
    pub user_agent: Option<String>,
    /// Headers merged under every request's own headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Whole-request timeout, body included.
    pub timeout: Option<Duration>,
    /// Retries of the request-open phase after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled per attempt.
    pub retry_base_delay: Duration,
}

impl Default for HttpStreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            max_retries: MAX_RETRIES,
            retry_base_delay: BASE_DELAY,
        }
    }
}

impl HttpStreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Seed from environment settings; unset values keep their defaults.
    pub fn from_env(env: &EnvConfig) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = &env.endpoint {
            config.base_url = endpoint.clone();
        }
        config.timeout = env.timeout;
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
