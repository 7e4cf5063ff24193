//! Session Synchronization Integration
//!
//! Client-side session layer that keeps one authoritative view of "who is
//! signed in" and "what is their profile" in step with an external auth
//! provider.
//!
//! # Features
//!
//! - Debounced auth events: a burst of provider callbacks is processed once,
//!   using the last value
//! - Deduplicated profile fetches, with late results for a previous session
//!   discarded
//! - Resilient auth calls with per-attempt timeouts and exponential backoff
//! - Substring-based error classification with a bounded diagnostic log
//! - Local demo mode that never touches the provider
//!
//! # Example
//!
//! ```rust,ignore
//! use session_sync::{session_config, SessionCoordinator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     session_sync::init_tracing(session_sync::DEFAULT_LOG_DIRECTIVE);
//!
//!     let config = session_config()
//!         .debounce(std::time::Duration::from_millis(100))
//!         .auth_max_attempts(2)
//!         .build()?;
//!
//!     let coordinator =
//!         SessionCoordinator::new(config, Arc::new(my_provider), Arc::new(my_store));
//!     coordinator.initialize().await;
//!
//!     if let Err(failure) = coordinator.sign_in("user@example.com", "secret").await {
//!         println!("{}", failure.descriptor.user_message);
//!     }
//!
//!     let mut updates = coordinator.subscribe();
//!     while updates.changed().await.is_ok() {
//!         let snapshot = updates.borrow().clone();
//!         println!("signed in as {:?}", snapshot.subject());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: Session, profile and configuration data structures
//! - `error`: Error hierarchy and the error classifier
//! - `core`: Auth provider and profile store interfaces, scheduler
//! - `resilience`: Timeout and retry executor
//! - `session`: Synchronization state machine and the coordinator
//! - `builders`: Fluent configuration builder
//! - `telemetry`: Tracing setup and sync metrics

pub mod builders;
pub mod core;
pub mod error;
pub mod resilience;
pub mod session;
pub mod telemetry;
pub mod types;

// Re-export coordinator
pub use session::{SessionCoordinator, SyncPhase};

// Re-export builders
pub use builders::{session_config, SessionConfigBuilder};

// Re-export collaborator interfaces
pub use core::{
    create_mock_auth_provider, create_mock_profile_store, AuthProvider, AuthStateListener,
    AuthSubscription, MockAuthProvider, MockProfileStore, ProfileStore, ScheduledTask, Scheduler,
    TokioScheduler,
};

// Re-export error types
pub use error::{
    classify_message, AuthFailure, ConfigurationError, ErrorCategory, ErrorClassifier,
    ErrorContext, ErrorDescriptor, SessionError, SessionResult,
};

// Re-export resilience
pub use resilience::{OperationOutcome, ResilientExecutor, RetryStats};

// Re-export telemetry
pub use telemetry::{init_tracing, MetricsSnapshot, SyncMetrics, DEFAULT_LOG_DIRECTIVE};

// Re-export types
pub use types::{
    Profile, ProfileCounters, RetryPolicy, Session, SessionConfig, SessionSnapshot, SignUpRequest,
};
