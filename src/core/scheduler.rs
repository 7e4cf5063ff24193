//! Scheduler
//!
//! Delayed, cancellable background tasks.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Handle to a scheduled task.
#[derive(Debug)]
pub struct ScheduledTask {
    abort: Option<AbortHandle>,
}

impl ScheduledTask {
    /// Wrap a tokio abort handle.
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// Handle for a task that was never started.
    pub fn detached() -> Self {
        Self { abort: None }
    }

    /// Cancel the task if it has not completed. Aborting a finished task is a no-op.
    pub fn cancel(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Whether the task has completed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.abort
            .as_ref()
            .map(|abort| abort.is_finished())
            .unwrap_or(true)
    }
}

/// Scheduler interface (for dependency injection).
pub trait Scheduler: Send + Sync + 'static {
    /// Run `task` after `delay`.
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask;

    /// Run `task` as soon as possible.
    fn spawn(&self, task: BoxFuture<'static, ()>) -> ScheduledTask {
        self.schedule(Duration::ZERO, task)
    }
}

/// Scheduler backed by the ambient tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl TokioScheduler {
    /// Create new scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!("no tokio runtime available, task dropped");
                return ScheduledTask::detached();
            }
        };

        let join = handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        });
        ScheduledTask::new(join.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_task_runs_after_delay() {
        let scheduler = TokioScheduler::new();
        let runs = Arc::new(AtomicU32::new(0));

        let counter = runs.clone();
        let task = scheduler.schedule(
            Duration::from_millis(100),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_never_runs() {
        let scheduler = TokioScheduler::new();
        let runs = Arc::new(AtomicU32::new(0));

        let counter = runs.clone();
        let task = scheduler.schedule(
            Duration::from_millis(100),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        task.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_schedule_without_runtime_is_detached() {
        let task = TokioScheduler::new().schedule(Duration::ZERO, async {}.boxed());
        assert!(task.is_finished());
    }
}
