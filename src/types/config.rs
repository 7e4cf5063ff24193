//! Session layer configuration types.

use std::time::Duration;

use crate::error::DEFAULT_DIAGNOSTIC_CAPACITY;

/// Delay used to coalesce bursts of auth events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Retry and timeout budget for one call site.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Feature area recorded on error descriptors.
    pub feature: String,
    /// Operation name recorded on error descriptors.
    pub action: String,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff before retry `n` is `base_delay * 2^n`.
    pub base_delay: Duration,
    /// Budget for a single attempt.
    pub timeout: Duration,
    /// Extra random delay as a fraction of the backoff (0.0-1.0). Never subtracts.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            feature: "general".to_string(),
            action: "operation".to_string(),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Policy used for credential sign-in.
    pub fn auth() -> Self {
        Self {
            feature: "auth".to_string(),
            max_attempts: 2,
            ..Self::default()
        }
    }

    /// Single attempt, no retry.
    pub fn single_attempt(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the feature name
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = feature.into();
        self
    }

    /// Set the action name
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Set the maximum number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base backoff delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the jitter factor
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay to wait after a failed attempt (0-based) before the next one.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor);

        if self.jitter > 0.0 {
            let extra = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
            delay.saturating_add(Duration::from_secs_f64(extra))
        } else {
            delay
        }
    }
}

/// Session coordinator configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Auth events arriving within this window collapse into one run.
    pub debounce: Duration,
    /// Policy for generic resilient calls.
    pub default_policy: RetryPolicy,
    /// Policy for credential sign-in.
    pub auth_policy: RetryPolicy,
    /// Size of the classifier's diagnostic log.
    pub diagnostic_capacity: usize,
    /// Subject identifier of the synthetic demo session.
    pub demo_subject: String,
    /// Display name of the synthetic demo profile.
    pub demo_display_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            default_policy: RetryPolicy::default(),
            auth_policy: RetryPolicy::auth(),
            diagnostic_capacity: DEFAULT_DIAGNOSTIC_CAPACITY,
            demo_subject: "demo-user".to_string(),
            demo_display_name: "Demo User".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.base_delay, Duration::from_secs(1));

        let auth = RetryPolicy::auth();
        assert_eq!(auth.feature, "auth");
        assert_eq!(auth.max_attempts, 2);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_jitter_never_shortens_backoff() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter(0.5);
        for attempt in 0..4 {
            let delay = policy.backoff_delay(attempt);
            let floor = Duration::from_millis(100) * 2u32.pow(attempt);
            assert!(delay >= floor);
            assert!(delay <= floor.mul_f64(1.5));
        }
    }
}
