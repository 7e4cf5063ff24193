//! Session Types
//!
//! Data structures shared across the session layer.

pub mod config;
pub mod profile;
pub mod session;

pub use config::{RetryPolicy, SessionConfig, DEFAULT_DEBOUNCE};
pub use profile::{Profile, ProfileCounters};
pub use session::{Session, SessionSnapshot, SignUpRequest};
