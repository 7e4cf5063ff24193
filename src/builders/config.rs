//! Configuration Builder
//!
//! Fluent builder for session coordinator configuration.

use std::time::Duration;

use crate::error::{ConfigurationError, SessionError};
use crate::types::{RetryPolicy, SessionConfig};

/// Session configuration builder.
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    debounce: Option<Duration>,
    max_attempts: Option<u32>,
    auth_max_attempts: Option<u32>,
    timeout: Option<Duration>,
    base_delay: Option<Duration>,
    jitter: Option<f64>,
    diagnostic_capacity: Option<usize>,
    demo_subject: Option<String>,
    demo_display_name: Option<String>,
}

impl SessionConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window for auth events.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Set attempts for generic resilient calls.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set attempts for credential sign-in.
    pub fn auth_max_attempts(mut self, attempts: u32) -> Self {
        self.auth_max_attempts = Some(attempts);
        self
    }

    /// Set per-attempt timeout (applies to every policy).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set base backoff delay (applies to every policy).
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set backoff jitter factor.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Set diagnostic log capacity.
    pub fn diagnostic_capacity(mut self, capacity: usize) -> Self {
        self.diagnostic_capacity = Some(capacity);
        self
    }

    /// Set the demo subject identifier.
    pub fn demo_subject(mut self, subject: impl Into<String>) -> Self {
        self.demo_subject = Some(subject.into());
        self
    }

    /// Set the demo display name.
    pub fn demo_display_name(mut self, name: impl Into<String>) -> Self {
        self.demo_display_name = Some(name.into());
        self
    }

    /// Load overrides from environment variables.
    pub fn from_env(mut self) -> Self {
        if let Some(ms) = env_parse::<u64>("SESSION_SYNC_DEBOUNCE_MS") {
            self.debounce = Some(Duration::from_millis(ms));
        }
        if let Some(attempts) = env_parse("SESSION_SYNC_MAX_ATTEMPTS") {
            self.max_attempts = Some(attempts);
        }
        if let Some(attempts) = env_parse("SESSION_SYNC_AUTH_MAX_ATTEMPTS") {
            self.auth_max_attempts = Some(attempts);
        }
        if let Some(ms) = env_parse::<u64>("SESSION_SYNC_TIMEOUT_MS") {
            self.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse::<u64>("SESSION_SYNC_BASE_DELAY_MS") {
            self.base_delay = Some(Duration::from_millis(ms));
        }
        if let Some(capacity) = env_parse("SESSION_SYNC_DIAGNOSTIC_CAPACITY") {
            self.diagnostic_capacity = Some(capacity);
        }
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<SessionConfig, SessionError> {
        let defaults = SessionConfig::default();

        let mut default_policy = defaults.default_policy;
        let mut auth_policy = defaults.auth_policy;

        if let Some(attempts) = self.max_attempts {
            default_policy.max_attempts = attempts;
        }
        if let Some(attempts) = self.auth_max_attempts {
            auth_policy.max_attempts = attempts;
        }
        for policy in [&mut default_policy, &mut auth_policy] {
            if let Some(timeout) = self.timeout {
                policy.timeout = timeout;
            }
            if let Some(delay) = self.base_delay {
                policy.base_delay = delay;
            }
            if let Some(jitter) = self.jitter {
                policy.jitter = jitter.clamp(0.0, 1.0);
            }
        }

        validate_policy("default_policy", &default_policy)?;
        validate_policy("auth_policy", &auth_policy)?;

        let diagnostic_capacity = self
            .diagnostic_capacity
            .unwrap_or(defaults.diagnostic_capacity);
        if diagnostic_capacity == 0 {
            return Err(ConfigurationError::InvalidConfig {
                message: "diagnostic_capacity must be at least 1".to_string(),
            }
            .into());
        }

        let demo_subject = self.demo_subject.unwrap_or(defaults.demo_subject);
        if demo_subject.trim().is_empty() {
            return Err(ConfigurationError::MissingRequired {
                field: "demo_subject".to_string(),
            }
            .into());
        }

        Ok(SessionConfig {
            debounce: self.debounce.unwrap_or(defaults.debounce),
            default_policy,
            auth_policy,
            diagnostic_capacity,
            demo_subject,
            demo_display_name: self
                .demo_display_name
                .unwrap_or(defaults.demo_display_name),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

fn validate_policy(name: &str, policy: &RetryPolicy) -> Result<(), ConfigurationError> {
    if policy.max_attempts == 0 {
        return Err(ConfigurationError::InvalidConfig {
            message: format!("{}.max_attempts must be at least 1", name),
        });
    }
    if policy.timeout.is_zero() {
        return Err(ConfigurationError::InvalidConfig {
            message: format!("{}.timeout must be greater than zero", name),
        });
    }
    Ok(())
}

/// Create a new session configuration builder.
pub fn session_config() -> SessionConfigBuilder {
    SessionConfigBuilder::new()
}
