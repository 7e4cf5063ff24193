//! Error classification and diagnostic history.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use super::SessionError;

/// Number of descriptors kept in the diagnostic log by default.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 50;

/// Error category for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Connectivity problems, including timeouts
    Network,
    /// Credentials rejected or session no longer valid
    Auth,
    /// Input rejected by the backend
    Validation,
    /// Backend failure
    Server,
    /// Nothing matched
    Unknown,
}

/// Ordered substring table. The first row with a hit wins.
const CLASSIFICATION_RULES: &[(&[&str], ErrorCategory)] = &[
    (&["network", "fetch", "timeout"], ErrorCategory::Network),
    (&["auth", "unauthorized", "forbidden"], ErrorCategory::Auth),
    (&["validation", "invalid", "required"], ErrorCategory::Validation),
    (&["server", "500", "internal"], ErrorCategory::Server),
];

impl ErrorCategory {
    /// Check if errors in this category are retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Fixed sentence shown to users for this category
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Network => {
                "Connection problem. Please check your internet connection and try again."
            }
            ErrorCategory::Auth => "Your session is no longer valid. Please sign in again.",
            ErrorCategory::Validation => "Some information is invalid. Please check your input.",
            ErrorCategory::Server => {
                "The service is temporarily unavailable. Please try again later."
            }
            ErrorCategory::Unknown => "Something went wrong. Please try again.",
        }
    }

    /// Stable name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::Auth => "AUTH",
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::Server => "SERVER",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw failure message.
pub fn classify_message(message: &str) -> ErrorCategory {
    let lowered = message.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| lowered.contains(needle)))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}

/// Where and when a failure happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Feature area, e.g. "auth".
    pub feature: String,
    /// Operation within the feature, e.g. "sign_in".
    pub action: String,
    /// When the descriptor was built.
    pub timestamp: DateTime<Utc>,
    /// Component that observed the failure.
    pub origin: Option<String>,
}

impl ErrorContext {
    /// Create a context stamped with the current time.
    pub fn new(feature: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            action: action.into(),
            timestamp: Utc::now(),
            origin: None,
        }
    }

    /// Set origin.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Classified, immutable description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub category: ErrorCategory,
    /// Raw failure text, kept for diagnostics only.
    pub message: String,
    pub context: ErrorContext,
    pub retryable: bool,
    pub user_message: String,
}

impl ErrorDescriptor {
    /// Build a descriptor from a raw message.
    pub fn new(message: impl Into<String>, context: ErrorContext) -> Self {
        let message = message.into();
        let category = classify_message(&message);
        Self {
            category,
            message,
            context,
            retryable: category.is_retryable(),
            user_message: category.user_message().to_string(),
        }
    }
}

/// Classifier with a bounded log of the descriptors it produced.
pub struct ErrorClassifier {
    capacity: usize,
    log: Mutex<VecDeque<ErrorDescriptor>>,
}

impl ErrorClassifier {
    /// Create a classifier keeping at most `capacity` descriptors.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            log: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Classify an error.
    pub fn classify(&self, error: &SessionError) -> ErrorCategory {
        error.category()
    }

    /// Build a descriptor, log it and append it to the diagnostic history.
    pub fn handle_error(&self, error: &SessionError, context: ErrorContext) -> ErrorDescriptor {
        let descriptor = ErrorDescriptor::new(error.raw_message(), context);

        tracing::warn!(
            feature = %descriptor.context.feature,
            action = %descriptor.context.action,
            category = %descriptor.category,
            retryable = descriptor.retryable,
            code = error.error_code(),
            "{}",
            descriptor.message
        );

        self.record(descriptor.clone());
        descriptor
    }

    /// Append a descriptor, evicting the oldest once full.
    pub fn record(&self, descriptor: ErrorDescriptor) {
        let mut log = self.log.lock();
        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(descriptor);
    }

    /// True if any buffered descriptor falls within the trailing window.
    pub fn has_recent_errors(&self, window: Duration) -> bool {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window));
        let log = self.log.lock();
        match cutoff {
            Some(cutoff) => log
                .iter()
                .any(|descriptor| descriptor.context.timestamp >= cutoff),
            // Window reaches past the representable range.
            None => !log.is_empty(),
        }
    }

    /// Buffered descriptors, oldest first.
    pub fn recent_errors(&self) -> Vec<ErrorDescriptor> {
        self.log.lock().iter().cloned().collect()
    }

    /// Serialize the diagnostic log as a JSON array.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.recent_errors())
    }

    /// Empty the diagnostic log.
    pub fn clear(&self) {
        self.log.lock().clear();
    }

    /// Maximum number of buffered descriptors.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(classify_message("Network request failed"), ErrorCategory::Network);
        assert_eq!(classify_message("Failed to fetch"), ErrorCategory::Network);
        assert_eq!(classify_message("Invalid email"), ErrorCategory::Validation);
        assert_eq!(classify_message("Unauthorized"), ErrorCategory::Auth);
        assert_eq!(classify_message("HTTP 500"), ErrorCategory::Server);
        assert_eq!(classify_message("teapot"), ErrorCategory::Unknown);
    }

    #[test]
    fn test_first_matching_row_wins() {
        // "invalid" and "timeout" both match; network is checked first.
        assert_eq!(classify_message("Invalid response: timeout"), ErrorCategory::Network);
        // "Invalid login credentials" has no auth keyword.
        assert_eq!(
            classify_message("Invalid login credentials"),
            ErrorCategory::Validation
        );
        assert_eq!(classify_message("Auth session missing"), ErrorCategory::Auth);
    }

    #[test]
    fn test_retryable_is_a_function_of_category() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
        assert!(!ErrorCategory::Unknown.is_retryable());

        let descriptor = ErrorDescriptor::new("internal error", ErrorContext::new("feed", "load"));
        assert!(descriptor.retryable);
        assert_eq!(descriptor.user_message, ErrorCategory::Server.user_message());
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let classifier = ErrorClassifier::new(2);
        for action in ["first", "second", "third"] {
            classifier.handle_error(
                &SessionError::provider("teapot"),
                ErrorContext::new("test", action),
            );
        }

        let actions: Vec<_> = classifier
            .recent_errors()
            .into_iter()
            .map(|d| d.context.action)
            .collect();
        assert_eq!(actions, vec!["second", "third"]);
    }

    #[test]
    fn test_has_recent_errors_window() {
        let classifier = ErrorClassifier::default();
        assert!(!classifier.has_recent_errors(Duration::from_secs(300)));

        let stale = Utc::now() - chrono::Duration::minutes(10);
        classifier.record(ErrorDescriptor::new(
            "network down",
            ErrorContext::new("feed", "load").at(stale),
        ));
        assert!(!classifier.has_recent_errors(Duration::from_secs(300)));
        assert!(classifier.has_recent_errors(Duration::from_secs(900)));

        classifier.handle_error(
            &SessionError::provider("network down"),
            ErrorContext::new("feed", "load"),
        );
        assert!(classifier.has_recent_errors(Duration::from_secs(60)));

        classifier.clear();
        assert!(classifier.recent_errors().is_empty());
    }

    #[test]
    fn test_export_json() {
        let classifier = ErrorClassifier::new(4);
        classifier.handle_error(
            &SessionError::provider("Unauthorized"),
            ErrorContext::new("auth", "sign_in").origin("coordinator"),
        );

        let json = classifier.export_json().unwrap();
        assert!(json.contains("\"category\":\"AUTH\""));
        assert!(json.contains("\"origin\":\"coordinator\""));
    }
}
