use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use serde::Serialize;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    effects::{FireSource, RunReport},
    error::{EngineError, Result},
};

use super::{FireCallback, FireRequest, StartGate};

/// `Idle -> Activated -> Fired -> Idle`, re-enterable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ManualStatus {
    Idle,
    /// At least one activation is waiting out its delay.
    Activated,
    /// At least one activation has invoked the callback and not returned yet.
    Fired,
}

#[derive(Default)]
struct Activations {
    waiting: u32,
    firing: u32,
}

struct ManualInner {
    delay_seconds: u32,
    on_fire: FireCallback,
    activations: Mutex<Activations>,
    fire_count: AtomicU64,
    disarmed: CancellationToken,
}

/// Fires its callback once per `activate()`, after the configured delay.
#[derive(Clone)]
pub struct ManualTrigger {
    inner: Arc<ManualInner>,
}

impl ManualTrigger {
    pub(crate) fn new(delay_seconds: u32, on_fire: FireCallback) -> Self {
        Self {
            inner: Arc::new(ManualInner {
                delay_seconds,
                on_fire,
                activations: Mutex::new(Activations::default()),
                fire_count: AtomicU64::new(0),
                disarmed: CancellationToken::new(),
            }),
        }
    }

    pub fn delay_seconds(&self) -> u32 {
        self.inner.delay_seconds
    }

    pub fn status(&self) -> ManualStatus {
        let activations = lock(&self.inner);
        if activations.firing > 0 {
            ManualStatus::Fired
        } else if activations.waiting > 0 {
            ManualStatus::Activated
        } else {
            ManualStatus::Idle
        }
    }

    pub fn fire_count(&self) -> u64 {
        self.inner.fire_count.load(Ordering::SeqCst)
    }

    pub fn disarm(&self) {
        self.inner.disarmed.cancel();
    }

    pub fn is_disarmed(&self) -> bool {
        self.inner.disarmed.is_cancelled()
    }

    /// Wait out the delay, then invoke the callback and return its result.
    ///
    /// Disarming the trigger while the delay is pending resolves this
    /// activation with [`EngineError::Disarmed`] without invoking the callback.
    pub async fn activate(&self) -> Result<RunReport> {
        if self.is_disarmed() {
            return Err(EngineError::Disarmed);
        }

        let mut activation = ActivationGuard::enter(&self.inner);

        if self.inner.delay_seconds > 0 {
            let delay = Duration::from_secs(u64::from(self.inner.delay_seconds));
            tokio::select! {
                biased;
                _ = self.inner.disarmed.cancelled() => return Err(EngineError::Disarmed),
                _ = time::sleep(delay) => {}
            }
        }

        if self.is_disarmed() {
            return Err(EngineError::Disarmed);
        }

        activation.fire();
        self.inner.fire_count.fetch_add(1, Ordering::SeqCst);

        let request = FireRequest {
            source: FireSource::Manual,
            gate: StartGate::revocable(self.inner.disarmed.clone()),
        };
        (self.inner.on_fire)(request).await
    }
}

impl fmt::Debug for ManualTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTrigger")
            .field("delay_seconds", &self.inner.delay_seconds)
            .field("status", &self.status())
            .field("fire_count", &self.fire_count())
            .field("disarmed", &self.is_disarmed())
            .finish()
    }
}

/// Keeps the activation counters right even when the `activate()` future is
/// dropped half way.
struct ActivationGuard<'a> {
    inner: &'a ManualInner,
    firing: bool,
}

impl<'a> ActivationGuard<'a> {
    fn enter(inner: &'a ManualInner) -> Self {
        lock(inner).waiting += 1;
        Self {
            inner,
            firing: false,
        }
    }

    fn fire(&mut self) {
        let mut activations = lock(self.inner);
        activations.waiting -= 1;
        activations.firing += 1;
        self.firing = true;
    }
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        let mut activations = lock(self.inner);
        if self.firing {
            activations.firing -= 1;
        } else {
            activations.waiting -= 1;
        }
    }
}

fn lock(inner: &ManualInner) -> std::sync::MutexGuard<'_, Activations> {
    inner
        .activations
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
