//! Telemetry
//!
//! Observability components for the session layer.
//!
//! - **Logging**: `tracing` subscriber setup
//! - **Metrics**: counters for coalescing, deduplication and stale results

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, DEFAULT_LOG_DIRECTIVE};
pub use metrics::{MetricsSnapshot, SyncMetrics};
