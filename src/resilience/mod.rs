//! Resilience
//!
//! Timeout and retry-with-backoff for calls to external collaborators.
//! Every resilient call goes through [`ResilientExecutor`]; a plain call is
//! a policy with `max_attempts = 1`.

pub mod retry;

pub use retry::{OperationOutcome, ResilientExecutor, RetryStats};
