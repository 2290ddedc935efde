use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    effects::{FireSource, RunReport},
    error::Result,
};

use super::{FireCallback, FireRequest, StartGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScheduledStatus {
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Disabled,
    Disarmed,
}

/// Result of handing a due signal to a [`ScheduledTrigger`].
#[derive(Debug)]
pub enum DueOutcome {
    /// The trigger was not enabled; nothing ran and nothing changed.
    Ignored(IgnoreReason),
    /// The callback was invoked; carries whatever it returned.
    Fired(Result<RunReport>),
}

impl DueOutcome {
    pub fn fired(&self) -> bool {
        matches!(self, DueOutcome::Fired(_))
    }
}

struct ScheduledState {
    enabled: bool,
    /// Gates of firings whose runs have not returned yet.
    pending: Vec<StartGate>,
}

struct ScheduledInner {
    fire_at: DateTime<Utc>,
    on_fire: FireCallback,
    state: Mutex<ScheduledState>,
    enabled_tx: watch::Sender<bool>,
    fire_count: AtomicU64,
    disarmed: CancellationToken,
}

/// Fires its callback when the scheduler signals `fire_at` has passed and the
/// trigger is enabled at that moment.
///
/// Each enable is good for one firing: a due signal that fires the callback
/// also flips the trigger back to disabled. Whoever drives the clock has to
/// enable (and re-register) the trigger again for a later firing.
#[derive(Clone)]
pub struct ScheduledTrigger {
    inner: Arc<ScheduledInner>,
}

impl ScheduledTrigger {
    pub(crate) fn new(fire_at: DateTime<Utc>, enabled: bool, on_fire: FireCallback) -> Self {
        let (enabled_tx, _) = watch::channel(enabled);
        Self {
            inner: Arc::new(ScheduledInner {
                fire_at,
                on_fire,
                state: Mutex::new(ScheduledState {
                    enabled,
                    pending: Vec::new(),
                }),
                enabled_tx,
                fire_count: AtomicU64::new(0),
                disarmed: CancellationToken::new(),
            }),
        }
    }

    pub fn fire_at(&self) -> DateTime<Utc> {
        self.inner.fire_at
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn status(&self) -> ScheduledStatus {
        if self.is_enabled() {
            ScheduledStatus::Enabled
        } else {
            ScheduledStatus::Disabled
        }
    }

    pub fn fire_count(&self) -> u64 {
        self.inner.fire_count.load(Ordering::SeqCst)
    }

    /// Follows the enabled flag. A platform alarm service watches this to
    /// register or cancel its own wake-ups.
    pub fn subscribe_enabled(&self) -> watch::Receiver<bool> {
        self.inner.enabled_tx.subscribe()
    }

    /// Idempotent. Has no effect on a disarmed trigger.
    pub fn enable(&self) {
        let mut state = self.state();
        if self.is_disarmed() {
            return;
        }
        state.enabled = true;
        self.inner.enabled_tx.send_replace(true);
    }

    /// Idempotent. Also stops any firing whose run has not started executing
    /// effects yet; runs already under way are left to finish.
    pub fn disable(&self) {
        let mut state = self.state();
        state.enabled = false;
        for gate in &state.pending {
            gate.revoke();
        }
        self.inner.enabled_tx.send_replace(false);
    }

    pub fn disarm(&self) {
        self.inner.disarmed.cancel();
        self.disable();
    }

    pub fn is_disarmed(&self) -> bool {
        self.inner.disarmed.is_cancelled()
    }

    /// Handle the scheduler's "fire_at has passed" signal.
    ///
    /// The enabled flag is read and consumed under the same lock `disable()`
    /// takes, so a disable that lands before this call always wins. A disable
    /// that lands after it, but before the run commits its start gate, still
    /// prevents the run.
    pub async fn signal_due(&self) -> DueOutcome {
        let gate = {
            let mut state = self.state();
            if self.is_disarmed() {
                return DueOutcome::Ignored(IgnoreReason::Disarmed);
            }
            if !state.enabled {
                return DueOutcome::Ignored(IgnoreReason::Disabled);
            }

            state.enabled = false;
            self.inner.enabled_tx.send_replace(false);

            let gate = StartGate::revocable(self.inner.disarmed.clone());
            state.pending.push(gate.clone());
            gate
        };

        self.inner.fire_count.fetch_add(1, Ordering::SeqCst);

        let request = FireRequest {
            source: FireSource::Scheduled,
            gate: gate.clone(),
        };
        let result = (self.inner.on_fire)(request).await;

        self.state().pending.retain(|pending| !pending.same_as(&gate));

        DueOutcome::Fired(result)
    }

    fn state(&self) -> MutexGuard<'_, ScheduledState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ScheduledTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTrigger")
            .field("fire_at", &self.inner.fire_at)
            .field("status", &self.status())
            .field("fire_count", &self.fire_count())
            .field("disarmed", &self.is_disarmed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::RunStatus;
    use crate::trigger::fire_callback;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn counting_trigger(enabled: bool) -> (ScheduledTrigger, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let trigger = ScheduledTrigger::new(
            Utc::now(),
            enabled,
            fire_callback(move |request: FireRequest| {
                let counter = counter.clone();
                async move {
                    if !request.gate.commit() {
                        return Ok(RunReport::skipped("test", request.source, "revoked"));
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    let mut report = RunReport::skipped("test", request.source, "");
                    report.status = RunStatus::Completed;
                    Ok(report)
                }
            }),
        );
        (trigger, runs)
    }

    #[tokio::test]
    async fn test_disabled_never_fires() {
        let (trigger, runs) = counting_trigger(false);

        for _ in 0..5 {
            let outcome = trigger.signal_due().await;
            assert!(matches!(outcome, DueOutcome::Ignored(IgnoreReason::Disabled)));
        }

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(trigger.status(), ScheduledStatus::Disabled);
    }

    #[tokio::test]
    async fn test_one_firing_per_enable() {
        let (trigger, runs) = counting_trigger(true);

        assert!(trigger.signal_due().await.fired());
        assert!(!trigger.signal_due().await.fired());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        trigger.enable();
        trigger.enable();
        assert!(trigger.signal_due().await.fired());
        assert!(!trigger.signal_due().await.fired());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(trigger.fire_count(), 2);
    }

    #[tokio::test]
    async fn test_disable_before_commit_prevents_run() {
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let trigger = {
            let (reached, release, runs) = (reached.clone(), release.clone(), runs.clone());
            ScheduledTrigger::new(
                Utc::now(),
                true,
                fire_callback(move |request: FireRequest| {
                    let (reached, release, runs) = (reached.clone(), release.clone(), runs.clone());
                    async move {
                        reached.notify_one();
                        release.notified().await;
                        if !request.gate.commit() {
                            return Ok(RunReport::skipped("test", request.source, "revoked"));
                        }
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(RunReport::skipped("test", request.source, "ran"))
                    }
                }),
            )
        };

        let due = {
            let trigger = trigger.clone();
            tokio::spawn(async move { trigger.signal_due().await })
        };

        reached.notified().await;
        trigger.disable();
        release.notify_one();

        match due.await.unwrap() {
            DueOutcome::Fired(Ok(report)) => {
                assert_eq!(
                    report.status,
                    RunStatus::Skipped {
                        reason: "revoked".to_string()
                    }
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disable_after_commit_does_not_interrupt() {
        let committed = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let trigger = {
            let (committed, release) = (committed.clone(), release.clone());
            ScheduledTrigger::new(
                Utc::now(),
                true,
                fire_callback(move |request: FireRequest| {
                    let (committed, release) = (committed.clone(), release.clone());
                    async move {
                        assert!(request.gate.commit());
                        committed.notify_one();
                        release.notified().await;
                        let mut report = RunReport::skipped("test", request.source, "");
                        report.status = RunStatus::Completed;
                        Ok(report)
                    }
                }),
            )
        };

        let due = {
            let trigger = trigger.clone();
            tokio::spawn(async move { trigger.signal_due().await })
        };

        committed.notified().await;
        trigger.disable();
        release.notify_one();

        match due.await.unwrap() {
            DueOutcome::Fired(Ok(report)) => assert!(report.is_completed()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enabled_watch_follows_transitions() {
        let (trigger, _) = counting_trigger(false);
        let mut rx = trigger.subscribe_enabled();
        assert!(!*rx.borrow_and_update());

        trigger.enable();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        trigger.signal_due().await;
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_disarmed_ignores_due_and_enable() {
        let (trigger, runs) = counting_trigger(true);
        trigger.disarm();
        trigger.enable();

        assert!(matches!(
            trigger.signal_due().await,
            DueOutcome::Ignored(IgnoreReason::Disarmed)
        ));
        assert!(!trigger.is_enabled());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
