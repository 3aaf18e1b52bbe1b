use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::StreamError;

/// Shared cooperative cancellation flag for a stream session.
pub type CancelSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub fn cancel_signal() -> CancelSignal {
    Arc::new(AtomicBool::new(false))
}

pub fn is_cancelled(cancel: Option<&CancelSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Awaits `future`, abandoning it with [`StreamError::Cancelled`] once the
/// signal is raised.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancelSignal>,
) -> Result<F::Output, StreamError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(StreamError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(StreamError::Cancelled);
            }
            return Ok(output);
        }
    }
}
