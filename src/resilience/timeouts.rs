//! Timeout enforcement.
//!
//! Every outbound attempt runs under a deadline. An elapsed deadline is turned
//! into the caller's error type so it flows through the same retry path as
//! any other transport failure.

use std::future::Future;
use std::time::Duration;

/// Run `fut` under `limit`, mapping an elapsed deadline with `on_timeout`.
pub async fn with_deadline<T, E, Fut>(
    limit: Duration,
    fut: Fut,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}
