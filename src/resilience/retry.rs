//! Retry Logic
//!
//! Per-attempt timeout with exponential backoff between retryable failures.
//!
//! Timeouts are a race, not a cancellation: an attempt that misses its budget
//! keeps running detached. Its result is tagged with the attempt number and
//! dropped on arrival, so it is never reported to the caller.

use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{
    ErrorClassifier, ErrorContext, ErrorDescriptor, SessionError, SessionResult,
};
use crate::types::RetryPolicy;

/// Result of a resilient call.
#[derive(Debug, Clone)]
pub struct OperationOutcome<T> {
    pub data: Option<T>,
    pub error: Option<ErrorDescriptor>,
    pub success: bool,
    /// Attempts actually started.
    pub attempts: u32,
}

impl<T> OperationOutcome<T> {
    fn succeeded(data: T, attempts: u32) -> Self {
        Self {
            data: Some(data),
            error: None,
            success: true,
            attempts,
        }
    }

    fn failed(error: ErrorDescriptor, attempts: u32) -> Self {
        Self {
            data: None,
            error: Some(error),
            success: false,
            attempts,
        }
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<T, ErrorDescriptor> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ErrorDescriptor::new(
                "operation produced no result",
                ErrorContext::new("general", "operation").origin("resilient_executor"),
            )),
        }
    }
}

/// Retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_attempts: u32,
    pub successful_retries: u32,
    pub failed_operations: u32,
    pub timeouts: u32,
    pub late_results_discarded: u32,
}

/// Executes operations under a [`RetryPolicy`].
pub struct ResilientExecutor {
    classifier: Arc<ErrorClassifier>,
    stats: Mutex<RetryStats>,
}

impl ResilientExecutor {
    /// Create new executor reporting failures to `classifier`.
    pub fn new(classifier: Arc<ErrorClassifier>) -> Self {
        Self {
            classifier,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    /// Classifier used for retry decisions and final descriptors.
    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        &self.classifier
    }

    /// Execute an operation with timeout and retry.
    ///
    /// Attempt `n` (0-based) is retried only when its failure is retryable and
    /// `n < max_attempts - 1`; the wait before the next attempt is
    /// `base_delay * 2^n`.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: F,
        policy: &RetryPolicy,
    ) -> OperationOutcome<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = SessionResult<T>> + Send + 'static,
    {
        let max_attempts = policy.max_attempts.max(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<(u32, SessionResult<T>)>();
        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 0..max_attempts {
            attempts += 1;
            self.stats.lock().total_attempts += 1;

            let sender = tx.clone();
            let pending = operation();
            tokio::spawn(async move {
                let result = match AssertUnwindSafe(pending).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(SessionError::TaskFailed {
                        message: "operation panicked".to_string(),
                    }),
                };
                // The receiver is gone once the caller has its outcome.
                let _ = sender.send((attempt, result));
            });

            match self.await_attempt(&mut rx, attempt, policy.timeout).await {
                Ok(data) => {
                    if attempt > 0 {
                        self.stats.lock().successful_retries += 1;
                    }
                    return OperationOutcome::succeeded(data, attempts);
                }
                Err(error) => {
                    let category = self.classifier.classify(&error);
                    let retry = category.is_retryable() && attempt + 1 < max_attempts;

                    tracing::debug!(
                        feature = %policy.feature,
                        attempt,
                        category = %category,
                        retry,
                        "attempt failed: {}",
                        error
                    );

                    last_error = Some(error);
                    if !retry {
                        break;
                    }

                    tokio::time::sleep(policy.backoff_delay(attempt)).await;
                }
            }
        }

        self.stats.lock().failed_operations += 1;

        let error = last_error.unwrap_or_else(|| SessionError::TaskFailed {
            message: "no attempt was made".to_string(),
        });
        let context = ErrorContext::new(policy.feature.clone(), policy.action.clone())
            .origin("resilient_executor");
        let descriptor = self.classifier.handle_error(&error, context);

        OperationOutcome::failed(descriptor, attempts)
    }

    async fn await_attempt<T>(
        &self,
        rx: &mut mpsc::UnboundedReceiver<(u32, SessionResult<T>)>,
        attempt: u32,
        timeout: Duration,
    ) -> SessionResult<T> {
        // No deadline when the budget runs past the clock's range.
        let deadline = tokio::time::Instant::now().checked_add(timeout);

        loop {
            let received = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, rx.recv()).await,
                None => Ok(rx.recv().await),
            };
            match received {
                Ok(Some((generation, result))) if generation == attempt => return result,
                Ok(Some((generation, _))) => {
                    self.stats.lock().late_results_discarded += 1;
                    tracing::debug!(generation, attempt, "discarding late result");
                }
                Ok(None) => {
                    return Err(SessionError::TaskFailed {
                        message: "result channel closed".to_string(),
                    })
                }
                Err(_) => {
                    self.stats.lock().timeouts += 1;
                    return Err(SessionError::Timeout { timeout });
                }
            }
        }
    }

    /// Get retry statistics.
    pub fn get_stats(&self) -> RetryStats {
        self.stats.lock().clone()
    }
}

impl Default for ResilientExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ErrorClassifier::default()))
    }
}
