use std::future::Future;
use std::time::Duration;

/// Retries `f` up to `attempts` times with quadratic backoff (`n^2` seconds,
/// `n` being the 1-based attempt number that just failed), capped at
/// `cap_secs`. Sleeps between attempts only, never after the last one.
///
/// Shared by the LB provider's `Create` (cap 8s, §4.C) and the dispatcher's
/// event-level retry (cap 64s, §7).
pub async fn retry<T, E, F, Fut>(attempts: u32, cap_secs: u64, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    for n in 1..=attempts {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                log::warn!("attempt {n}/{attempts} failed: {e}");
                last_err = Some(e);
                if n < attempts {
                    let backoff = (n * n) as u64;
                    let delay = backoff.min(cap_secs);
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
            }
        }
    }
    Err(last_err.expect("attempts >= 1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_first_try_without_sleeping() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(3, 8, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(3, 0, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
