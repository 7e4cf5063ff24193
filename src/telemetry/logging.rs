//! Logging
//!
//! Installs a `tracing-subscriber` formatter for binaries and tests that
//! embed the session layer. Library code only emits events.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVE: &str = "session_sync=info";

/// Install a global fmt subscriber. `RUST_LOG` takes precedence over
/// `default_directive`. Returns false if a subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
