//! Session Coordinator
//!
//! Owns the authoritative (session, profile) pair. Auth events are debounced
//! so that a burst collapses into one run using the last value; profile
//! fetches are deduplicated per subject and tagged so that a result arriving
//! after the session moved on is dropped instead of overwriting newer state.

use futures::FutureExt;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

use crate::core::{
    AuthProvider, AuthStateListener, AuthSubscription, ProfileStore, Scheduler, TokioScheduler,
};
use crate::error::{AuthFailure, ErrorClassifier, SessionResult};
use crate::resilience::{ResilientExecutor, RetryStats};
use crate::session::state::{FetchResult, FetchTicket, Settlement, SyncPhase, SyncState, Transition};
use crate::telemetry::{MetricsSnapshot, SyncMetrics};
use crate::types::{Profile, Session, SessionConfig, SessionSnapshot, SignUpRequest};

/// Session coordinator. Cloning yields another handle to the same state.
pub struct SessionCoordinator<A: AuthProvider, P: ProfileStore, S: Scheduler = TokioScheduler> {
    inner: Arc<Inner<A, P, S>>,
}

struct Inner<A: AuthProvider, P: ProfileStore, S: Scheduler> {
    config: SessionConfig,
    provider: Arc<A>,
    store: Arc<P>,
    scheduler: S,
    classifier: Arc<ErrorClassifier>,
    executor: ResilientExecutor,
    state: Mutex<SyncState>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    metrics: SyncMetrics,
    initialized: AtomicBool,
    subscription: Mutex<Option<AuthSubscription>>,
}

impl<A: AuthProvider, P: ProfileStore, S: Scheduler> Clone for SessionCoordinator<A, P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: AuthProvider, P: ProfileStore> SessionCoordinator<A, P, TokioScheduler> {
    /// Create a coordinator scheduling on the ambient tokio runtime.
    pub fn new(config: SessionConfig, provider: Arc<A>, store: Arc<P>) -> Self {
        Self::with_scheduler(config, provider, store, TokioScheduler::new())
    }
}

impl<A: AuthProvider, P: ProfileStore, S: Scheduler> SessionCoordinator<A, P, S> {
    /// Create a coordinator with a custom scheduler.
    pub fn with_scheduler(
        config: SessionConfig,
        provider: Arc<A>,
        store: Arc<P>,
        scheduler: S,
    ) -> Self {
        let classifier = Arc::new(ErrorClassifier::new(config.diagnostic_capacity));
        let executor = ResilientExecutor::new(classifier.clone());
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::initial());

        Self {
            inner: Arc::new(Inner {
                config,
                provider,
                store,
                scheduler,
                classifier,
                executor,
                state: Mutex::new(SyncState::new()),
                snapshot_tx,
                metrics: SyncMetrics::new(),
                initialized: AtomicBool::new(false),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to provider events and feed the persisted session through
    /// the debounce path. Only the first call has any effect.
    pub async fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            tracing::warn!("session coordinator already initialized");
            return;
        }

        let weak: Weak<Inner<A, P, S>> = Arc::downgrade(&self.inner);
        let listener: AuthStateListener = Arc::new(move |session: Option<Session>| {
            if let Some(inner) = weak.upgrade() {
                inner.on_auth_event(session);
            }
        });
        let subscription = self.inner.provider.on_auth_state_change(listener);
        *self.inner.subscription.lock() = Some(subscription);

        let generation_before = self.inner.state.lock().window_generation();

        let session = match self.inner.provider.get_current_session().await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(error = %error, "could not restore session, starting signed out");
                None
            }
        };

        if self.inner.state.lock().window_generation() != generation_before {
            tracing::debug!(
                "live auth event arrived during initialization, skipping restored session"
            );
            return;
        }
        self.inner.on_auth_event(session);
    }

    /// Entry point for provider events. Never processed inline: each call
    /// (re)arms the debounce window and cancels the previous one.
    pub fn on_auth_event(&self, session: Option<Session>) {
        self.inner.on_auth_event(session);
    }

    /// Sign in through the resilient executor using the auth policy.
    ///
    /// Session state is not touched here; the provider's event does that.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<(), AuthFailure> {
        let provider = self.inner.provider.clone();
        let identifier = identifier.to_string();
        let secret = SecretString::new(secret.to_string());
        let policy = self.inner.config.auth_policy.clone().with_action("sign_in");

        let outcome = self
            .inner
            .executor
            .execute(
                move || {
                    let provider = provider.clone();
                    let identifier = identifier.clone();
                    let secret = secret.clone();
                    async move { provider.sign_in_with_credentials(&identifier, &secret).await }
                },
                &policy,
            )
            .await;

        match outcome.into_result() {
            Ok(session) => {
                tracing::info!(subject = %session.subject, "sign-in succeeded");
                Ok(())
            }
            Err(descriptor) => Err(AuthFailure::from_descriptor(descriptor)),
        }
    }

    /// Register an account. Exactly one attempt: repeating a sign-up is unsafe.
    pub async fn sign_up(
        &self,
        identifier: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<(), AuthFailure> {
        let provider = self.inner.provider.clone();
        let request = SignUpRequest {
            identifier: identifier.to_string(),
            secret: SecretString::new(secret.to_string()),
            display_name: display_name.to_string(),
        };
        let policy = self
            .inner
            .config
            .auth_policy
            .clone()
            .with_max_attempts(1)
            .with_action("sign_up");

        let outcome = self
            .inner
            .executor
            .execute(
                move || {
                    let provider = provider.clone();
                    let request = request.clone();
                    async move { provider.sign_up(request).await }
                },
                &policy,
            )
            .await;

        match outcome.into_result() {
            Ok(Some(session)) => {
                let profile = Profile::new(session.subject.clone(), display_name);
                if let Err(error) = self.inner.store.upsert(profile).await {
                    tracing::warn!(
                        subject = %session.subject,
                        error = %error,
                        "initial profile upsert failed"
                    );
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(descriptor) => Err(AuthFailure::from_descriptor(descriptor)),
        }
    }

    /// Install a local demo session and profile without contacting the provider.
    ///
    /// Fails with `SessionError::DemoConflict` while a real session is active.
    pub fn sign_in_demo(&self) -> SessionResult<()> {
        let config = &self.inner.config;
        let session = Session::new(config.demo_subject.clone(), "demo-access-token", None, None);
        let profile = Profile::new(config.demo_subject.clone(), config.demo_display_name.clone());

        let mut state = self.inner.state.lock();
        state.enter_demo(session, profile)?;
        self.inner.publish(&state);
        tracing::info!(subject = %config.demo_subject, "entered demo mode");
        Ok(())
    }

    /// Sign out. Provider failures are logged; local state is always cleared.
    pub async fn sign_out(&self) {
        let in_demo = self.inner.state.lock().is_demo_mode();

        if !in_demo {
            let provider = self.inner.provider.clone();
            let policy = self
                .inner
                .config
                .default_policy
                .clone()
                .with_feature("auth")
                .with_action("sign_out")
                .with_max_attempts(1);
            let outcome = self
                .inner
                .executor
                .execute(
                    move || {
                        let provider = provider.clone();
                        async move { provider.sign_out().await }
                    },
                    &policy,
                )
                .await;
            if !outcome.success {
                tracing::warn!("provider sign-out failed, clearing local session anyway");
            }
        }

        let window = {
            let mut state = self.inner.state.lock();
            let window = state.reset();
            self.inner.publish(&state);
            window
        };
        if let Some(window) = window {
            window.cancel();
        }
        tracing::info!(demo = in_demo, "signed out");
    }

    /// Re-fetch the current subject's profile unless a fetch is already in
    /// flight, in which case that fetch will update state.
    pub async fn refresh_profile(&self) {
        let ticket = {
            let mut state = self.inner.state.lock();
            if state.is_demo_mode() {
                return;
            }
            let subject = match state.current_subject() {
                Some(subject) => subject.to_string(),
                None => return,
            };
            state.begin_fetch(&subject)
        };

        let ticket = match ticket {
            Some(ticket) => ticket,
            None => {
                self.inner.metrics.record_fetch_deduplicated();
                tracing::debug!("profile fetch already in flight");
                return;
            }
        };

        // The fetch runs detached so it settles even if this future is dropped.
        let (done_tx, done_rx) = oneshot::channel();
        let inner = self.inner.clone();
        let fetch = ticket.clone();
        let _ = self.inner.scheduler.spawn(
            async move {
                inner.fetch_profile(fetch).await;
                let _ = done_tx.send(());
            }
            .boxed(),
        );

        if done_rx.await.is_err() {
            tracing::warn!(subject = %ticket.subject, "profile refresh task did not complete");
            self.inner.state.lock().release_fetch(&ticket);
        }
    }

    /// Unsubscribe from the provider and cancel any scheduled window.
    pub fn dispose(&self) {
        if let Some(subscription) = self.inner.subscription.lock().take() {
            self.inner.provider.unsubscribe(subscription);
        }
        let window = self.inner.state.lock().clear_window();
        if let Some(window) = window {
            window.cancel();
            tracing::debug!("cancelled pending auth event on dispose");
        }
    }

    /// Receiver notified after every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Current published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.snapshot().session
    }

    /// Current profile, if loaded.
    pub fn profile(&self) -> Option<Arc<Profile>> {
        self.snapshot().profile
    }

    /// True until the first coalesced event has been fully processed.
    pub fn is_loading(&self) -> bool {
        self.snapshot().loading
    }

    /// Whether the synthetic demo session is installed.
    pub fn is_demo_mode(&self) -> bool {
        self.snapshot().is_demo_mode
    }

    /// Current phase of the synchronization state machine.
    pub fn phase(&self) -> SyncPhase {
        self.inner.state.lock().phase()
    }

    /// True if any failure was recorded within the trailing window.
    pub fn has_recent_errors(&self, window: Duration) -> bool {
        self.inner.classifier.has_recent_errors(window)
    }

    /// Classifier holding the diagnostic log.
    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        &self.inner.classifier
    }

    /// Executor retry statistics.
    pub fn retry_stats(&self) -> RetryStats {
        self.inner.executor.get_stats()
    }

    /// Snapshot of the sync counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl<A: AuthProvider, P: ProfileStore, S: Scheduler> Inner<A, P, S> {
    fn on_auth_event(self: &Arc<Self>, session: Option<Session>) {
        self.metrics.record_event();

        let weak = Arc::downgrade(self);
        let delay = self.config.debounce;
        let superseded = self.state.lock().arm_window(|generation| {
            self.scheduler.schedule(
                delay,
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.fire_window(generation, session);
                    }
                }
                .boxed(),
            )
        });

        if let Some(previous) = superseded {
            previous.cancel();
            self.metrics.record_superseded();
            tracing::debug!("auth event superseded by a newer one");
        }
    }

    fn fire_window(self: &Arc<Self>, generation: u64, session: Option<Session>) {
        let transition = {
            let mut state = self.state.lock();
            if !state.take_window(generation) {
                return;
            }
            let transition = state.run_processing(|state| state.apply_session(session));
            self.publish(&state);
            transition
        };

        let transition = match transition {
            Some(transition) => transition,
            None => {
                tracing::debug!("processing run already active, event dropped");
                return;
            }
        };
        self.metrics.record_run();

        match transition {
            Transition::FetchProfile(ticket) => {
                let inner = self.clone();
                // Handle dropped on purpose: fetches run to completion and are
                // filtered on settlement instead of being aborted.
                let _ = self
                    .scheduler
                    .spawn(async move { inner.fetch_profile(ticket).await }.boxed());
            }
            Transition::FetchInFlight => {
                self.metrics.record_fetch_deduplicated();
                tracing::debug!("profile fetch already in flight");
            }
            Transition::SignedOut => tracing::debug!("session cleared"),
            Transition::Ignored => tracing::debug!("null session ignored in demo mode"),
        }
    }

    async fn fetch_profile(&self, ticket: FetchTicket) {
        self.metrics.record_fetch_started();

        let result = match self.store.fetch_by_identifier(&ticket.subject).await {
            Ok(profile) => FetchResult::Loaded(profile),
            Err(error) => {
                self.metrics.record_fetch_failure();
                tracing::warn!(
                    subject = %ticket.subject,
                    category = %error.category(),
                    "profile fetch failed: {}",
                    error
                );
                FetchResult::Failed
            }
        };

        let mut state = self.state.lock();
        if state.settle_fetch(&ticket, result) == Settlement::Stale {
            self.metrics.record_stale_result();
            tracing::debug!(subject = %ticket.subject, "discarding profile for a stale session");
        }
        self.publish(&state);
    }

    fn publish(&self, state: &SyncState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }
}
