use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use super::kv::StoreError;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(10);

/// Retries an idempotent store call with bounded backoff.
///
/// Only safe for reads and other idempotent operations - appends and
/// compare-and-swaps are issued exactly once by their callers so a transient
/// failure can never duplicate their effect.
pub async fn with_backoff<T, F, Fut>(op: &str, mut call: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut last_error = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(op = %op, attempt, error = %e, "Transient store failure");
                last_error = Some(e);
                if attempt < MAX_ATTEMPTS {
                    sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| StoreError::Unavailable("retries exhausted".to_string())))
}
