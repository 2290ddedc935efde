//! Triggers: runtime objects that decide when a segment's run starts.
//!
//! A [`TriggerConfig`] is the persisted description; [`TriggerFactory`] turns it
//! into a [`Trigger`] bound to a [`FireCallback`]. Triggers are cheap handles
//! over shared state, so a clone can be moved into a scheduler task while the
//! segment keeps its own copy.

pub mod config;
pub mod factory;
pub mod manual;
pub mod scheduled;

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

use tokio_util::sync::CancellationToken;

use crate::{
    effects::{FireSource, RunReport},
    error::Result,
};

pub use config::{TriggerConfig, TriggerKind};
pub use factory::TriggerFactory;
pub use manual::{ManualStatus, ManualTrigger};
pub use scheduled::{DueOutcome, IgnoreReason, ScheduledStatus, ScheduledTrigger};

pub type FireFuture = Pin<Box<dyn Future<Output = Result<RunReport>> + Send + 'static>>;

/// What a trigger invokes when it fires.
pub type FireCallback = Arc<dyn Fn(FireRequest) -> FireFuture + Send + Sync>;

/// Wrap an async closure as a [`FireCallback`].
pub fn fire_callback<F, Fut>(f: F) -> FireCallback
where
    F: Fn(FireRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RunReport>> + Send + 'static,
{
    Arc::new(move |request| Box::pin(f(request)))
}

/// Handed to the callback on every firing.
#[derive(Debug, Clone)]
pub struct FireRequest {
    pub source: FireSource,
    /// Must be committed right before the first effect executes.
    pub gate: StartGate,
}

impl FireRequest {
    pub fn direct() -> Self {
        Self {
            source: FireSource::Direct,
            gate: StartGate::open(),
        }
    }
}

const GATE_OPEN: u8 = 0;
const GATE_COMMITTED: u8 = 1;
const GATE_REVOKED: u8 = 2;

/// One-shot race between "start executing effects" and "don't".
///
/// The run calls [`commit`](StartGate::commit) immediately before its first
/// effect; `disable()`/`disarm()` call [`revoke`](StartGate::revoke). Whichever
/// gets there first wins and the other side observes it.
#[derive(Clone)]
pub struct StartGate {
    state: Arc<AtomicU8>,
    revoke_on: Option<CancellationToken>,
}

impl StartGate {
    /// A gate nobody can revoke.
    pub fn open() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(GATE_OPEN)),
            revoke_on: None,
        }
    }

    /// A gate that also counts as revoked once `token` is cancelled.
    pub(crate) fn revocable(token: CancellationToken) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(GATE_OPEN)),
            revoke_on: Some(token),
        }
    }

    /// Returns `true` if the run may start.
    pub fn commit(&self) -> bool {
        self.follow_revoke_on();
        match self.state.compare_exchange(
            GATE_OPEN,
            GATE_COMMITTED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => true,
            Err(current) => current == GATE_COMMITTED,
        }
    }

    /// Returns `true` if the run is now guaranteed not to start.
    pub fn revoke(&self) -> bool {
        match self.state.compare_exchange(
            GATE_OPEN,
            GATE_REVOKED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => true,
            Err(current) => current == GATE_REVOKED,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == GATE_COMMITTED
    }

    /// Also true once the token the gate was made [`revocable`] with has been
    /// cancelled, even if nobody called `revoke()`.
    ///
    /// [`revocable`]: StartGate::revocable
    pub fn is_revoked(&self) -> bool {
        self.follow_revoke_on();
        self.state.load(Ordering::SeqCst) == GATE_REVOKED
    }

    fn follow_revoke_on(&self) {
        if self.revoke_on.as_ref().is_some_and(|t| t.is_cancelled()) {
            self.revoke();
        }
    }

    pub(crate) fn same_as(&self, other: &StartGate) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for StartGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::SeqCst) {
            GATE_OPEN => "open",
            GATE_COMMITTED => "committed",
            _ => "revoked",
        };
        f.debug_struct("StartGate").field("state", &state).finish()
    }
}

/// A live trigger built from a [`TriggerConfig`].
#[derive(Debug, Clone)]
pub enum Trigger {
    Manual(ManualTrigger),
    Scheduled(ScheduledTrigger),
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Manual(_) => TriggerKind::Manual,
            Trigger::Scheduled(_) => TriggerKind::Scheduled,
        }
    }

    /// The externally observable configuration of this trigger right now.
    pub fn config(&self) -> TriggerConfig {
        match self {
            Trigger::Manual(t) => TriggerConfig::manual(t.delay_seconds()),
            Trigger::Scheduled(t) => TriggerConfig::scheduled(t.fire_at(), t.is_enabled()),
        }
    }

    pub fn as_manual(&self) -> Option<&ManualTrigger> {
        match self {
            Trigger::Manual(t) => Some(t),
            Trigger::Scheduled(_) => None,
        }
    }

    pub fn as_scheduled(&self) -> Option<&ScheduledTrigger> {
        match self {
            Trigger::Scheduled(t) => Some(t),
            Trigger::Manual(_) => None,
        }
    }

    /// Number of times the callback has been invoked.
    pub fn fire_count(&self) -> u64 {
        match self {
            Trigger::Manual(t) => t.fire_count(),
            Trigger::Scheduled(t) => t.fire_count(),
        }
    }

    /// Stop the trigger from starting any further runs. Runs that already
    /// committed their start gate are left alone.
    pub fn disarm(&self) {
        match self {
            Trigger::Manual(t) => t.disarm(),
            Trigger::Scheduled(t) => t.disarm(),
        }
    }

    pub fn is_disarmed(&self) -> bool {
        match self {
            Trigger::Manual(t) => t.is_disarmed(),
            Trigger::Scheduled(t) => t.is_disarmed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_commit_wins_over_late_revoke() {
        let gate = StartGate::open();
        assert!(gate.commit());
        assert!(!gate.revoke());
        assert!(gate.is_committed());
        assert!(gate.commit());
    }

    #[test]
    fn test_gate_revoke_wins_over_late_commit() {
        let gate = StartGate::open();
        assert!(gate.revoke());
        assert!(!gate.commit());
        assert!(gate.is_revoked());
    }

    #[test]
    fn test_gate_follows_cancelled_token() {
        let token = CancellationToken::new();
        let gate = StartGate::revocable(token.clone());
        token.cancel();
        assert!(!gate.commit());
        assert!(gate.is_revoked());
    }

    #[test]
    fn test_gate_reports_revoked_once_token_cancelled() {
        let token = CancellationToken::new();
        let gate = StartGate::revocable(token.clone());
        assert!(!gate.is_revoked());

        token.cancel();
        assert!(gate.is_revoked());
        assert!(!gate.commit());
    }

    #[test]
    fn test_gate_clones_share_state() {
        let gate = StartGate::open();
        let clone = gate.clone();
        assert!(clone.revoke());
        assert!(gate.is_revoked());
        assert!(gate.same_as(&clone));
        assert!(!gate.same_as(&StartGate::open()));
    }
}
