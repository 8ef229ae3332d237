use std::future::Future;
use std::time::Duration;

use crate::error::KindredError;

/// Bounds every store call so no request blocks indefinitely
#[derive(Debug, Clone, Copy)]
pub struct StoreDeadline {
    timeout: Duration,
}

impl StoreDeadline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `fut` under the deadline. Elapsed time surfaces as `StorageTimeout`.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T, KindredError>
    where
        F: Future<Output = Result<T, KindredError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("{} exceeded {}ms", operation, self.timeout.as_millis());
                Err(KindredError::StorageTimeout(format!(
                    "{} exceeded {}ms",
                    operation,
                    self.timeout.as_millis()
                )))
            }
        }
    }

    /// Like [`run`](Self::run), but a timeout is retried exactly once.
    /// Every other error is returned as is.
    pub async fn run_with_retry<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, KindredError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, KindredError>>,
    {
        match self.run(operation, op()).await {
            Err(err) if err.is_retryable() => {
                tracing::info!("Retrying {} after timeout", operation);
                self.run(operation, op()).await
            }
            other => other,
        }
    }
}

impl Default for StoreDeadline {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let deadline = StoreDeadline::new(Duration::from_millis(50));
        let value = assert_ok!(deadline.run("noop", async { Ok::<_, KindredError>(7) }).await);
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let deadline = StoreDeadline::new(Duration::from_millis(10));
        let result = deadline
            .run("sleepy", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, KindredError>(())
            })
            .await;
        assert!(matches!(assert_err!(result), KindredError::StorageTimeout(_)));
    }

    #[tokio::test]
    async fn test_timeout_retried_once() {
        let deadline = StoreDeadline::new(Duration::from_millis(10));
        let attempts = AtomicUsize::new(0);

        let result = deadline
            .run_with_retry("flaky", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok::<_, KindredError>("done")
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let deadline = StoreDeadline::new(Duration::from_millis(10));
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = deadline
            .run_with_retry("missing", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(KindredError::NotFound("gone".into()))
            })
            .await;

        assert!(matches!(result, Err(KindredError::NotFound(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
