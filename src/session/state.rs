//! Synchronization state machine.
//!
//! All coordinator state lives here and only changes through the methods
//! below. The coordinator holds it behind one lock and publishes a snapshot
//! after every transition.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::ScheduledTask;
use crate::error::{SessionError, SessionResult};
use crate::types::{Profile, Session, SessionSnapshot};

/// Coarse phase of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing scheduled, nothing running.
    Idle,
    /// An auth event is waiting for its debounce window to elapse.
    Debouncing,
    /// A coalesced event is being applied.
    Processing,
}

/// The single pending debounce task.
#[derive(Debug)]
struct DebounceWindow {
    generation: u64,
    task: ScheduledTask,
}

/// A profile fetch tagged with the subject and epoch it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub subject: String,
    pub epoch: u64,
}

/// What a profile fetch produced.
#[derive(Debug, Clone)]
pub enum FetchResult {
    Loaded(Option<Profile>),
    Failed,
}

/// How a settled fetch was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Published,
    Failed,
    /// The session moved on; the result was dropped.
    Stale,
}

/// What applying an auth event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    SignedOut,
    /// Session published; a fetch must be started for the ticket.
    FetchProfile(FetchTicket),
    /// Session published; a fetch for this subject is already in flight.
    FetchInFlight,
    /// Null event while in demo mode.
    Ignored,
}

#[derive(Debug)]
pub struct SyncState {
    session: Option<Session>,
    profile: Option<Arc<Profile>>,
    loading: bool,
    is_demo_mode: bool,
    window: Option<DebounceWindow>,
    window_generation: u64,
    processing: bool,
    pending_fetches: HashSet<String>,
    // Bumped whenever the session is cleared; fetches from an older epoch are stale.
    epoch: u64,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            session: None,
            profile: None,
            loading: true,
            is_demo_mode: false,
            window: None,
            window_generation: 0,
            processing: false,
            pending_fetches: HashSet::new(),
            epoch: 0,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        if self.processing {
            SyncPhase::Processing
        } else if self.window.is_some() {
            SyncPhase::Debouncing
        } else {
            SyncPhase::Idle
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            profile: self.profile.clone(),
            loading: self.loading,
            is_demo_mode: self.is_demo_mode,
        }
    }

    pub fn current_subject(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.subject.as_str())
    }

    pub fn is_demo_mode(&self) -> bool {
        self.is_demo_mode
    }

    pub fn window_generation(&self) -> u64 {
        self.window_generation
    }

    pub fn pending_fetch_count(&self) -> usize {
        self.pending_fetches.len()
    }

    /// Install a new debounce window built by `schedule`, which receives the
    /// window's generation. Returns the superseded window's task for cancellation.
    pub fn arm_window(
        &mut self,
        schedule: impl FnOnce(u64) -> ScheduledTask,
    ) -> Option<ScheduledTask> {
        self.window_generation += 1;
        let generation = self.window_generation;
        let previous = self.window.replace(DebounceWindow {
            generation,
            task: schedule(generation),
        });
        previous.map(|window| window.task)
    }

    /// Consume the window if `generation` is still the current one.
    pub fn take_window(&mut self, generation: u64) -> bool {
        match &self.window {
            Some(window) if window.generation == generation => {
                self.window = None;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending window, if any, returning its task for cancellation.
    pub fn clear_window(&mut self) -> Option<ScheduledTask> {
        self.window.take().map(|window| window.task)
    }

    /// Run `step` with the processing flag held. Returns `None` if a run is
    /// already active. The flag is released before returning.
    pub fn run_processing<R>(&mut self, step: impl FnOnce(&mut Self) -> R) -> Option<R> {
        if self.processing {
            return None;
        }
        self.processing = true;
        let result = step(self);
        self.processing = false;
        Some(result)
    }

    /// Apply a coalesced auth event.
    pub fn apply_session(&mut self, session: Option<Session>) -> Transition {
        if self.is_demo_mode {
            if session.is_none() {
                return Transition::Ignored;
            }
            // A real session ends demo mode.
            self.is_demo_mode = false;
        }

        let next_subject = session.as_ref().map(|s| s.subject.clone());
        if self.current_subject() != next_subject.as_deref() {
            self.profile = None;
        }
        self.session = session;

        match next_subject {
            None => {
                self.bump_epoch();
                self.loading = false;
                Transition::SignedOut
            }
            Some(subject) => match self.begin_fetch(&subject) {
                Some(ticket) => Transition::FetchProfile(ticket),
                None => Transition::FetchInFlight,
            },
        }
    }

    /// Reserve a fetch for `subject` unless one is already in flight.
    pub fn begin_fetch(&mut self, subject: &str) -> Option<FetchTicket> {
        if !self.pending_fetches.insert(subject.to_string()) {
            return None;
        }
        Some(FetchTicket {
            subject: subject.to_string(),
            epoch: self.epoch,
        })
    }

    /// Apply a settled fetch. Results are published only if the session still
    /// belongs to the ticket's subject and no sign-out happened in between.
    pub fn settle_fetch(&mut self, ticket: &FetchTicket, result: FetchResult) -> Settlement {
        // An older epoch's entry was already dropped from the pending set.
        if ticket.epoch != self.epoch {
            return Settlement::Stale;
        }
        self.pending_fetches.remove(&ticket.subject);

        if self.is_demo_mode || self.current_subject() != Some(ticket.subject.as_str()) {
            return Settlement::Stale;
        }
        self.loading = false;

        match result {
            FetchResult::Loaded(profile) => {
                self.profile = profile.map(Arc::new);
                Settlement::Published
            }
            FetchResult::Failed => Settlement::Failed,
        }
    }

    /// Release a reserved fetch that never ran.
    pub fn release_fetch(&mut self, ticket: &FetchTicket) {
        if ticket.epoch == self.epoch {
            self.pending_fetches.remove(&ticket.subject);
        }
    }

    /// Install the synthetic demo session.
    pub fn enter_demo(&mut self, session: Session, profile: Profile) -> SessionResult<()> {
        if self.session.is_some() && !self.is_demo_mode {
            return Err(SessionError::DemoConflict);
        }
        self.bump_epoch();
        self.session = Some(session);
        self.profile = Some(Arc::new(profile));
        self.is_demo_mode = true;
        self.loading = false;
        Ok(())
    }

    /// Clear everything local. Returns the pending window's task for cancellation.
    pub fn reset(&mut self) -> Option<ScheduledTask> {
        self.bump_epoch();
        self.session = None;
        self.profile = None;
        self.is_demo_mode = false;
        self.loading = false;
        self.processing = false;
        self.window.take().map(|window| window.task)
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
        // Fetches from the previous epoch are abandoned; their results are dropped.
        self.pending_fetches.clear();
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(subject: &str) -> Session {
        Session::new(subject, "token", None, None)
    }

    fn ticket(transition: Transition) -> FetchTicket {
        match transition {
            Transition::FetchProfile(ticket) => ticket,
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_phase_transitions() {
        let mut state = SyncState::new();
        assert_eq!(state.phase(), SyncPhase::Idle);

        state.arm_window(|_| ScheduledTask::detached());
        assert_eq!(state.phase(), SyncPhase::Debouncing);

        let generation = state.window_generation();
        assert!(state.take_window(generation));
        let observed = state.run_processing(|s| s.phase());
        assert_eq!(observed, Some(SyncPhase::Processing));
        assert_eq!(state.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_newer_window_supersedes_older() {
        let mut state = SyncState::new();
        assert!(state.arm_window(|_| ScheduledTask::detached()).is_none());
        let first = state.window_generation();
        assert!(state.arm_window(|_| ScheduledTask::detached()).is_some());

        assert!(!state.take_window(first));
        assert!(state.take_window(first + 1));
    }

    #[test]
    fn test_reentrant_processing_is_refused() {
        let mut state = SyncState::new();
        let nested = state.run_processing(|s| s.run_processing(|_| ()));
        assert_eq!(nested, Some(None));
        assert_eq!(state.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_fetch_deduplication() {
        let mut state = SyncState::new();
        let first = ticket(state.apply_session(Some(session("a"))));
        assert_eq!(state.apply_session(Some(session("a"))), Transition::FetchInFlight);
        assert!(state.begin_fetch("a").is_none());

        let settled = state.settle_fetch(&first, FetchResult::Loaded(Some(Profile::new("a", "A"))));
        assert_eq!(settled, Settlement::Published);
        assert_eq!(state.pending_fetch_count(), 0);
        assert!(state.begin_fetch("a").is_some());
    }

    #[test]
    fn test_result_after_sign_out_is_stale() {
        let mut state = SyncState::new();
        let fetch = ticket(state.apply_session(Some(session("a"))));
        assert_eq!(state.apply_session(None), Transition::SignedOut);

        let settled = state.settle_fetch(&fetch, FetchResult::Loaded(Some(Profile::new("a", "A"))));
        assert_eq!(settled, Settlement::Stale);
        assert!(state.snapshot().profile.is_none());
    }

    #[test]
    fn test_result_for_previous_subject_is_stale() {
        let mut state = SyncState::new();
        let stale = ticket(state.apply_session(Some(session("a"))));
        let fresh = ticket(state.apply_session(Some(session("b"))));

        assert_eq!(
            state.settle_fetch(&stale, FetchResult::Loaded(Some(Profile::new("a", "A")))),
            Settlement::Stale
        );
        assert_eq!(
            state.settle_fetch(&fresh, FetchResult::Loaded(Some(Profile::new("b", "B")))),
            Settlement::Published
        );
        assert_eq!(state.snapshot().profile.unwrap().subject, "b");
    }

    #[test]
    fn test_returning_to_subject_reuses_in_flight_fetch() {
        let mut state = SyncState::new();
        let first_a = ticket(state.apply_session(Some(session("a"))));
        let b = ticket(state.apply_session(Some(session("b"))));
        assert_eq!(state.apply_session(Some(session("a"))), Transition::FetchInFlight);
        assert_eq!(state.pending_fetch_count(), 2);

        assert_eq!(
            state.settle_fetch(&b, FetchResult::Loaded(Some(Profile::new("b", "B")))),
            Settlement::Stale
        );
        assert!(state.snapshot().loading);
        assert_eq!(
            state.settle_fetch(&first_a, FetchResult::Loaded(Some(Profile::new("a", "A")))),
            Settlement::Published
        );
        assert_eq!(state.pending_fetch_count(), 0);
        assert_eq!(state.snapshot().profile.unwrap().subject, "a");
    }

    #[test]
    fn test_released_fetch_can_be_reissued() {
        let mut state = SyncState::new();
        let fetch = ticket(state.apply_session(Some(session("a"))));
        assert!(state.begin_fetch("a").is_none());

        state.release_fetch(&fetch);
        assert!(state.begin_fetch("a").is_some());
    }

    #[test]
    fn test_failed_fetch_releases_pending_entry() {
        let mut state = SyncState::new();
        let fetch = ticket(state.apply_session(Some(session("a"))));
        assert_eq!(state.settle_fetch(&fetch, FetchResult::Failed), Settlement::Failed);
        assert_eq!(state.pending_fetch_count(), 0);
        assert!(!state.snapshot().loading);
    }

    #[test]
    fn test_demo_mode_rules() {
        let mut state = SyncState::new();
        state
            .enter_demo(session("demo"), Profile::new("demo", "Demo"))
            .unwrap();
        assert_eq!(state.apply_session(None), Transition::Ignored);
        assert!(state.is_demo_mode());

        let _ = state.apply_session(Some(session("real")));
        assert!(!state.is_demo_mode());

        let result = state.enter_demo(session("demo"), Profile::new("demo", "Demo"));
        assert!(matches!(result, Err(SessionError::DemoConflict)));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = SyncState::new();
        let _ = state.apply_session(Some(session("a")));
        state.arm_window(|_| ScheduledTask::detached());

        assert!(state.reset().is_some());
        let snapshot = state.snapshot();
        assert!(snapshot.session.is_none());
        assert!(!snapshot.loading);
        assert_eq!(state.pending_fetch_count(), 0);
        assert_eq!(state.phase(), SyncPhase::Idle);
    }
}
