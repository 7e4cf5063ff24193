//! Core Infrastructure
//!
//! Collaborator interfaces consumed by the session layer and the scheduler
//! used for debounce windows and background fetches.

pub mod auth;
pub mod profile_store;
pub mod scheduler;

pub use auth::{
    create_mock_auth_provider, AuthProvider, AuthStateListener, AuthSubscription,
    MockAuthProvider,
};
pub use profile_store::{create_mock_profile_store, MockProfileStore, ProfileStore};
pub use scheduler::{ScheduledTask, Scheduler, TokioScheduler};
