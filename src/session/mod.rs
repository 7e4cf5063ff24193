//! Session Synchronization
//!
//! Reconciles auth provider events into a single session/profile pair.

pub mod coordinator;
pub mod state;

pub use coordinator::SessionCoordinator;
pub use state::{FetchResult, FetchTicket, Settlement, SyncPhase, SyncState, Transition};
