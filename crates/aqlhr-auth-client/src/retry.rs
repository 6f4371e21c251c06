//! Backoff for auth service calls.
//!
//! Only transport failures (connect errors, timeouts) are retried. Any HTTP
//! response, 5xx included, goes back to the caller untouched.

use std::future::Future;
use std::time::Duration;

/// Retry schedule: `retries` extra attempts, the delay doubling from `base`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    retries: u32,
    base: Duration,
}

impl Backoff {
    /// 3 retries after 200ms, 400ms and 800ms.
    pub(crate) const AUTH_SERVICE: Backoff = Backoff {
        retries: 3,
        base: Duration::from_millis(200),
    };

    fn delay(&self, retry: u32) -> Duration {
        self.base * 2u32.pow(retry)
    }

    /// Run `send` until it yields a response or the schedule is spent.
    pub(crate) async fn send<F, Fut>(&self, send: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut retry = 0;
        loop {
            match send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if retry < self.retries => {
                    let delay = self.delay(retry);
                    retry += 1;
                    tracing::warn!(
                        retry,
                        of = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "auth service unreachable, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn auth_service_schedule_doubles() {
        let b = Backoff::AUTH_SERVICE;
        let delays: Vec<u128> = (0..3).map(|r| b.delay(r).as_millis()).collect();
        assert_eq!(delays, vec![200, 400, 800]);
    }

    #[tokio::test]
    async fn closed_port_spends_every_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let fast = Backoff {
            retries: 2,
            base: Duration::from_millis(1),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();

        let result = fast
            .send(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                client.get("http://127.0.0.1:1/auth/v1/user").send()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
