// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timeout guard racing an operation against a deadline.

use std::future::Future;
use std::time::Duration;

use courier_core::CourierError;
use tracing::{debug, warn};

/// Races `operation` against `budget`.
///
/// On expiry the future is dropped and the guard fails with
/// [`CourierError::Timeout`] carrying `message`. The timer is owned by the
/// returned future, so it is released on whichever branch wins.
pub async fn with_timeout<F, T>(
    operation: F,
    budget: Duration,
    message: &str,
) -> Result<T, CourierError>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(budget, operation).await {
        Ok(value) => Ok(value),
        Err(_elapsed) => {
            warn!(
                budget_ms = budget.as_millis() as u64,
                operation = message,
                "operation timed out"
            );
            Err(CourierError::Timeout {
                message: message.to_string(),
                duration: budget,
            })
        }
    }
}

/// Like [`with_timeout`], but the operation keeps running on its own task
/// after the deadline fires.
///
/// Used for sends: the transport call is not abandoned mid-flight, and a
/// late completion is logged so operators can spot duplicate deliveries.
pub async fn with_timeout_detached<F, T, E>(
    operation: F,
    budget: Duration,
    message: &str,
) -> Result<Result<T, E>, CourierError>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let label = message.to_string();
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let outcome = operation.await;
        if let Err(outcome) = tx.send(outcome) {
            // Receiver gone: the caller already reported a timeout.
            match outcome {
                Ok(_) => warn!(operation = %label, "operation completed after its deadline"),
                Err(e) => debug!(operation = %label, error = %e, "operation failed after its deadline"),
            }
        }
    });

    match with_timeout(rx, budget, message).await? {
        Ok(outcome) => Ok(outcome),
        Err(_canceled) => Err(CourierError::Internal(format!(
            "{message}: operation task ended without a result"
        ))),
    }
}

/// A reusable deadline with a default budget.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    budget: Duration,
}

impl TimeoutGuard {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Runs `operation` under the guard's default budget.
    pub async fn run<F, T>(&self, operation: F, message: &str) -> Result<T, CourierError>
    where
        F: Future<Output = T>,
    {
        with_timeout(operation, self.budget, message).await
    }

    /// Runs `operation` detached under the guard's default budget.
    pub async fn run_detached<F, T, E>(
        &self,
        operation: F,
        message: &str,
    ) -> Result<Result<T, E>, CourierError>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        with_timeout_detached(operation, self.budget, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn never_resolving_operation_times_out_with_message() {
        let start = tokio::time::Instant::now();
        let err = with_timeout(std::future::pending::<()>(), Duration::from_millis(50), "x")
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(60));
        assert!(err.to_string().contains('x'));
        assert!(matches!(err, CourierError::Timeout { duration, .. } if duration == Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn timeout_is_logged_with_operation_name() {
        let budget = Duration::from_secs(1);
        let _ = with_timeout(std::future::pending::<()>(), budget, "registration check").await;
        assert!(logs_contain("operation timed out"));
        assert!(logs_contain("registration check"));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_operation_returns_its_value() {
        let value = with_timeout(async { 7 }, Duration::from_secs(1), "fast")
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn inner_error_passes_through_untouched() {
        let guard = TimeoutGuard::new(Duration::from_secs(30));
        let result: Result<Result<(), &str>, _> = guard.run(async { Err("boom") }, "op").await;
        assert_eq!(result.unwrap(), Err("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn detached_operation_keeps_running_after_deadline() {
        let landed = Arc::new(AtomicBool::new(false));
        let flag = landed.clone();
        let op = async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>("late")
        };

        let err = with_timeout_detached(op, Duration::from_millis(50), "send")
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Timeout { .. }));
        assert!(!landed.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(landed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn detached_operation_returns_result_in_time() {
        let guard = TimeoutGuard::new(Duration::from_secs(1));
        let outcome = guard
            .run_detached(async { Err::<(), _>("rejected".to_string()) }, "send")
            .await
            .unwrap();
        assert_eq!(outcome, Err("rejected".to_string()));
    }
}
