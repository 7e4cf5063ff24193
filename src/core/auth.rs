//! Auth Provider
//!
//! Interface to the external authentication provider.

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{SessionError, SessionResult};
use crate::types::{Session, SignUpRequest};

/// Callback fired on every login, logout and token refresh.
pub type AuthStateListener = Arc<dyn Fn(Option<Session>) + Send + Sync>;

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthSubscription {
    id: u64,
}

impl AuthSubscription {
    /// Create a subscription handle.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Listener id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Auth provider interface.
#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    /// Register a session-changed listener.
    fn on_auth_state_change(&self, listener: AuthStateListener) -> AuthSubscription;

    /// Remove a previously registered listener.
    fn unsubscribe(&self, subscription: AuthSubscription);

    /// Session persisted by the provider, if any.
    async fn get_current_session(&self) -> SessionResult<Option<Session>>;

    /// Sign in with identifier and secret.
    async fn sign_in_with_credentials(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> SessionResult<Session>;

    /// Register a new account. Providers that confirm immediately return the session.
    async fn sign_up(&self, request: SignUpRequest) -> SessionResult<Option<Session>>;

    /// End the provider-side session.
    async fn sign_out(&self) -> SessionResult<()>;
}

/// Mock auth provider for testing.
#[derive(Default)]
pub struct MockAuthProvider {
    listeners: Mutex<Vec<(u64, AuthStateListener)>>,
    next_listener_id: AtomicU64,
    current_session: Mutex<Option<Session>>,
    current_session_error: Mutex<Option<SessionError>>,
    sign_in_results: Mutex<VecDeque<SessionResult<Session>>>,
    sign_up_results: Mutex<VecDeque<SessionResult<Option<Session>>>>,
    sign_out_error: Mutex<Option<SessionError>>,
    latency: Mutex<Duration>,
    emit_events: AtomicBool,
    sign_in_calls: AtomicU32,
    sign_up_calls: AtomicU32,
    sign_out_calls: AtomicU32,
    sign_in_history: Mutex<Vec<String>>,
    sign_up_history: Mutex<Vec<(String, String)>>,
}

impl MockAuthProvider {
    /// Create new mock provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session returned by `get_current_session`.
    pub fn set_current_session(&self, session: Option<Session>) -> &Self {
        *self.current_session.lock() = session;
        self
    }

    /// Make `get_current_session` fail once.
    pub fn set_current_session_error(&self, error: SessionError) -> &Self {
        *self.current_session_error.lock() = Some(error);
        self
    }

    /// Queue a sign-in result. When the queue is empty sign-in succeeds.
    pub fn push_sign_in_result(&self, result: SessionResult<Session>) -> &Self {
        self.sign_in_results.lock().push_back(result);
        self
    }

    /// Queue a sign-up result. When the queue is empty sign-up succeeds without a session.
    pub fn push_sign_up_result(&self, result: SessionResult<Option<Session>>) -> &Self {
        self.sign_up_results.lock().push_back(result);
        self
    }

    /// Make the next `sign_out` fail.
    pub fn set_sign_out_error(&self, error: SessionError) -> &Self {
        *self.sign_out_error.lock() = Some(error);
        self
    }

    /// Delay applied to sign-in and sign-up calls.
    pub fn set_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock() = latency;
        self
    }

    /// Emit auth events after successful sign-in and sign-out, like a real provider.
    pub fn set_emit_events(&self, emit: bool) -> &Self {
        self.emit_events.store(emit, Ordering::SeqCst);
        self
    }

    /// Fire a session-changed event to every listener.
    pub fn emit(&self, session: Option<Session>) {
        let listeners: Vec<AuthStateListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(session.clone());
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Number of sign-in calls received.
    pub fn sign_in_calls(&self) -> u32 {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    /// Number of sign-up calls received.
    pub fn sign_up_calls(&self) -> u32 {
        self.sign_up_calls.load(Ordering::SeqCst)
    }

    /// Number of sign-out calls received.
    pub fn sign_out_calls(&self) -> u32 {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Identifiers passed to sign-in, in call order.
    pub fn sign_in_history(&self) -> Vec<String> {
        self.sign_in_history.lock().clone()
    }

    /// (identifier, display name) pairs passed to sign-up, in call order.
    pub fn sign_up_history(&self) -> Vec<(String, String)> {
        self.sign_up_history.lock().clone()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    fn on_auth_state_change(&self, listener: AuthStateListener) -> AuthSubscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, listener));
        AuthSubscription::new(id)
    }

    fn unsubscribe(&self, subscription: AuthSubscription) {
        self.listeners
            .lock()
            .retain(|(id, _)| *id != subscription.id());
    }

    async fn get_current_session(&self) -> SessionResult<Option<Session>> {
        if let Some(error) = self.current_session_error.lock().take() {
            return Err(error);
        }
        Ok(self.current_session.lock().clone())
    }

    async fn sign_in_with_credentials(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> SessionResult<Session> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.sign_in_history.lock().push(identifier.to_string());
        self.simulate_latency().await;

        let result = self.sign_in_results.lock().pop_front().unwrap_or_else(|| {
            Ok(Session::new(
                identifier,
                format!("access-{}", secret.expose_secret().len()),
                Some("refresh".to_string()),
                None,
            ))
        });

        if let Ok(session) = &result {
            *self.current_session.lock() = Some(session.clone());
            if self.emit_events.load(Ordering::SeqCst) {
                self.emit(Some(session.clone()));
            }
        }
        result
    }

    async fn sign_up(&self, request: SignUpRequest) -> SessionResult<Option<Session>> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        self.sign_up_history
            .lock()
            .push((request.identifier, request.display_name));
        self.sign_up_results.lock().pop_front().unwrap_or(Ok(None))
    }

    async fn sign_out(&self) -> SessionResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.sign_out_error.lock().take() {
            return Err(error);
        }

        *self.current_session.lock() = None;
        if self.emit_events.load(Ordering::SeqCst) {
            self.emit(None);
        }
        Ok(())
    }
}

/// Create mock auth provider for testing.
pub fn create_mock_auth_provider() -> MockAuthProvider {
    MockAuthProvider::new()
}
