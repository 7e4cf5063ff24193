//! Profile Store
//!
//! Interface to the external profile backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::{SessionError, SessionResult};
use crate::types::Profile;

/// Profile store interface.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    /// Fetch the profile for a subject identifier.
    async fn fetch_by_identifier(&self, subject: &str) -> SessionResult<Option<Profile>>;

    /// Insert or replace a profile.
    async fn upsert(&self, profile: Profile) -> SessionResult<()>;
}

/// Mock profile store for testing.
#[derive(Default)]
pub struct MockProfileStore {
    profiles: Mutex<HashMap<String, Profile>>,
    fetch_history: Mutex<Vec<String>>,
    upsert_history: Mutex<Vec<Profile>>,
    next_error: Mutex<Option<SessionError>>,
    latency: Mutex<Duration>,
    fetch_calls: AtomicU32,
}

impl MockProfileStore {
    /// Create new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a profile.
    pub fn add_profile(&self, profile: Profile) -> &Self {
        self.profiles
            .lock()
            .insert(profile.subject.clone(), profile);
        self
    }

    /// Fail the next fetch or upsert.
    pub fn set_next_error(&self, error: SessionError) -> &Self {
        *self.next_error.lock() = Some(error);
        self
    }

    /// Delay applied to every fetch.
    pub fn set_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock() = latency;
        self
    }

    /// Number of fetches issued.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Subjects fetched, in call order.
    pub fn fetch_history(&self) -> Vec<String> {
        self.fetch_history.lock().clone()
    }

    /// Profiles passed to `upsert`, in call order.
    pub fn upsert_history(&self) -> Vec<Profile> {
        self.upsert_history.lock().clone()
    }

    fn check_error(&self) -> SessionResult<()> {
        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn fetch_by_identifier(&self, subject: &str) -> SessionResult<Option<Profile>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_history.lock().push(subject.to_string());

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.check_error()?;
        Ok(self.profiles.lock().get(subject).cloned())
    }

    async fn upsert(&self, profile: Profile) -> SessionResult<()> {
        self.check_error()?;
        self.upsert_history.lock().push(profile.clone());
        self.profiles
            .lock()
            .insert(profile.subject.clone(), profile);
        Ok(())
    }
}

/// Create mock profile store for testing.
pub fn create_mock_profile_store() -> MockProfileStore {
    MockProfileStore::new()
}
