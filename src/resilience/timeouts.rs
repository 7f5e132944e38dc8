//! Timeout enforcement.
//!
//! Every external call (processor submit, health probe, proxy attempt) runs
//! under a hard deadline. A timeout is reported distinctly from the call's
//! own error so callers can log and count it separately.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a call that did not succeed within its deadline.
#[derive(Debug, Error)]
pub enum CallError<E> {
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error(transparent)]
    Failed(E),
}

/// Run `call`, giving up after `limit`.
pub async fn call_with_timeout<F, T, E>(limit: Duration, call: F) -> Result<T, CallError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CallError::Failed(e)),
        Err(_) => Err(CallError::TimedOut(limit)),
    }
}
