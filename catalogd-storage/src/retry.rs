//! Capped retry for transient storage failures (spec.md §4.3 "Failure
//! semantics": "transient errors ... are retried internally, up to a small
//! fixed cap, before being surfaced").
//!
//! Grounded on the teacher's `with_retry` helper in
//! `tycho-indexer/src/extractor/mod.rs`, narrowed here to the one error
//! class the DAL is allowed to retry on its own (everything else is
//! surfaced immediately — retrying a `VersionConflict` would mask a
//! legitimate optimistic-concurrency loss the caller must decide how to
//! handle).

use std::future::Future;
use std::time::Duration;

use catalogd_core::CatalogError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(20);

/// Runs `op` up to [`MAX_ATTEMPTS`] times, retrying only on
/// [`CatalogError::TransientStorage`], with a doubling delay between
/// attempts. Any other error, or exhaustion of the cap, is returned as-is.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(CatalogError::TransientStorage(msg)) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(attempt, %msg, "retrying transient storage error");
                tokio::time::sleep(BASE_DELAY * 2u32.pow(attempt - 1)).await;
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_retries() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(CatalogError::TransientStorage("connection reset".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_cap() {
        let calls = AtomicU32::new(0);
        let result: Result<(), CatalogError> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CatalogError::TransientStorage("still down".into()))
        })
        .await;
        assert!(matches!(result, Err(CatalogError::TransientStorage(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn does_not_retry_other_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), CatalogError> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CatalogError::MissingItem("nope".into()))
        })
        .await;
        assert!(matches!(result, Err(CatalogError::MissingItem(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
