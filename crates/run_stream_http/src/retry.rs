use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Maximum retry attempts after an initial request attempt.
pub const MAX_RETRIES: u32 = 3;
/// Base delay before the first retry.
pub const BASE_DELAY: Duration = Duration::from_millis(500);

fn retryable_text_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused")
            .expect("retry regex must compile")
    })
}

/// Statuses worth another attempt: timeouts, throttling and gateway failures.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Status policy plus a text match on the error body for servers that report
/// transient failures under a generic status.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    is_retryable_status(status) || retryable_text_regex().is_match(error_text)
}

/// Exponential backoff: `base * 2^attempt`.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    base.saturating_mul(factor)
}
