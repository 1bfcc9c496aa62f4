//! Exponential backoff for upstream HTTP calls

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::Result;

/// Longest pause between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// 1s, 2s, 4s... capped at [`MAX_BACKOFF`]
fn backoff_delay(attempt: u32) -> Duration {
    2u64.checked_pow(attempt)
        .map(Duration::from_secs)
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

/// Run `operation` up to `max_retries + 1` times, sleeping 1s, 2s, 4s... between attempts
pub async fn retry_request<F, Fut, T>(what: &str, max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what,
                    attempt + 1,
                    max_retries.saturating_add(1),
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = retry_request("upstream call", 2, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::llm("transient"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_request("upstream call", 1, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::llm("down"))
        })
        .await;
        assert!(matches!(result, Err(Error::Llm(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), MAX_BACKOFF);
        assert_eq!(backoff_delay(64), MAX_BACKOFF);
        assert_eq!(backoff_delay(u32::MAX), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_retries_do_not_overflow() {
        let calls = AtomicU32::new(0);
        let result = retry_request("upstream call", u32::MAX, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 70 {
                Err(Error::llm("still down"))
            } else {
                Ok("up")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "up");
        assert_eq!(calls.load(Ordering::SeqCst), 71);
    }
}
