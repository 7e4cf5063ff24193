//! Session Error Types
//!
//! Error hierarchy for the session layer plus the classifier that turns raw
//! failures into user-facing descriptors.

pub mod classifier;

use std::time::Duration;
use thiserror::Error;

pub use classifier::{
    classify_message, ErrorCategory, ErrorClassifier, ErrorContext, ErrorDescriptor,
    DEFAULT_DIAGNOSTIC_CAPACITY,
};

/// Root error type for the session layer.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// Failure reported by the auth provider. Displays the provider text verbatim.
    #[error("{message}")]
    Provider { message: String },

    /// Failure reported by the profile store.
    #[error("{message}")]
    Store { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Operation task failed: {message}")]
    TaskFailed { message: String },

    #[error("Demo mode cannot start while a real session is active")]
    DemoConflict,

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl SessionError {
    /// Create a provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a profile store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "SESSION_PROVIDER",
            Self::Store { .. } => "SESSION_STORE",
            Self::Timeout { .. } => "SESSION_TIMEOUT",
            Self::TaskFailed { .. } => "SESSION_TASK",
            Self::DemoConflict => "SESSION_DEMO_CONFLICT",
            Self::Configuration(_) => "SESSION_CONFIG",
        }
    }

    /// The message the classifier inspects.
    ///
    /// Collaborator failures are passed through untouched so that a provider
    /// saying "Invalid email" classifies as validation rather than picking up
    /// words from a wrapper prefix.
    pub fn raw_message(&self) -> String {
        match self {
            Self::Provider { message } | Self::Store { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Category assigned by the classifier.
    pub fn category(&self) -> ErrorCategory {
        classify_message(&self.raw_message())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Failure returned from `sign_in` / `sign_up`.
///
/// Carries the friendly message meant for display and the descriptor meant
/// for logging. The raw provider text never reaches `message`.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct AuthFailure {
    /// User-facing message for the descriptor's category.
    pub message: String,
    /// Structured, classified failure.
    pub descriptor: ErrorDescriptor,
}

impl AuthFailure {
    pub(crate) fn from_descriptor(descriptor: ErrorDescriptor) -> Self {
        Self {
            message: descriptor.user_message.clone(),
            descriptor,
        }
    }

    /// Category of the underlying failure.
    pub fn category(&self) -> ErrorCategory {
        self.descriptor.category
    }

    /// Whether the provider rejected a sign-up because the identifier exists.
    pub fn is_already_registered(&self) -> bool {
        let raw = self.descriptor.message.to_lowercase();
        raw.contains("already registered") || raw.contains("already exists")
    }
}
