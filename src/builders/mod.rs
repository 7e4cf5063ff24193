//! Builders
//!
//! Fluent builders for session layer types.

pub mod config;

pub use config::{session_config, SessionConfigBuilder};
