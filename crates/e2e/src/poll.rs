//! Retry-until-timeout helper

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::{E2eError, E2eResult};

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Await `op` repeatedly until it yields `Some`, errors, or `limit` elapses.
///
/// `op` runs at least once even with a zero limit. An `Err` from `op` stops
/// polling immediately.
pub async fn poll_until<T, F, Fut>(
    what: &str,
    limit: Duration,
    interval: Duration,
    mut op: F,
) -> E2eResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Option<T>>>,
{
    let deadline = Instant::now() + limit;

    loop {
        if let Some(value) = op().await? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(E2eError::Timeout(format!("{} ({:?})", what, limit)));
        }
        sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_returns_once_condition_holds() {
        let attempts = AtomicUsize::new(0);
        let value = poll_until(
            "third attempt",
            Duration::from_secs(5),
            Duration::from_millis(1),
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok::<_, E2eError>((n >= 3).then_some(n)) }
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_times_out() {
        let err = poll_until::<(), _, _>(
            "never",
            Duration::from_millis(30),
            Duration::from_millis(5),
            || async { Ok::<_, E2eError>(None) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, E2eError::Timeout(ref what) if what.starts_with("never")));
    }

    #[tokio::test]
    async fn test_error_stops_polling() {
        let attempts = AtomicUsize::new(0);
        let err = poll_until::<(), _, _>(
            "failing",
            Duration::from_secs(5),
            Duration::from_millis(1),
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<Option<()>, _>(E2eError::ServerStartup("boom".into())) }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, E2eError::ServerStartup(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
