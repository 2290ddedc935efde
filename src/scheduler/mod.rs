//! In-process alarm clock that delivers due signals to scheduled triggers.
//!
//! Stands in for a platform alarm service: one tokio task per registration
//! sleeps until the trigger's `fire_at` and then calls
//! [`ScheduledTrigger::signal_due`]. A registration delivers one signal;
//! registering again (after re-enabling) schedules the next one.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::trigger::{DueOutcome, ScheduledTrigger};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

struct Alarm {
    registration: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Alarms {
    next_registration: u64,
    by_key: HashMap<Uuid, Alarm>,
}

#[derive(Clone, Default)]
pub struct AlarmClock {
    alarms: Arc<Mutex<Alarms>>,
}

impl AlarmClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake `trigger` at its `fire_at` (immediately if that is in the past).
    ///
    /// `key` is usually the segment id; an existing registration under the
    /// same key is cancelled. The handle resolves to `None` when the
    /// registration was cancelled before the due signal went out.
    pub async fn register(
        &self,
        key: Uuid,
        trigger: ScheduledTrigger,
    ) -> JoinHandle<Option<DueOutcome>> {
        let cancel = CancellationToken::new();
        let registration = {
            let mut alarms = self.alarms.lock().await;
            let registration = alarms.next_registration;
            alarms.next_registration += 1;

            if let Some(previous) = alarms.by_key.insert(
                key,
                Alarm {
                    registration,
                    cancel: cancel.clone(),
                },
            ) {
                log_debug!("replacing alarm for {}", key);
                previous.cancel.cancel();
            }
            registration
        };

        let wait = (trigger.fire_at() - Utc::now())
            .to_std()
            .unwrap_or_default();
        log_info!("alarm for {} set at {} (in {:?})", key, trigger.fire_at(), wait);

        let alarms = self.alarms.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log_debug!("alarm for {} cancelled", key);
                    return None;
                }
                _ = time::sleep(wait) => {}
            }

            {
                let mut alarms = alarms.lock().await;
                if alarms
                    .by_key
                    .get(&key)
                    .is_some_and(|alarm| alarm.registration == registration)
                {
                    alarms.by_key.remove(&key);
                }
            }

            log_info!("alarm for {} due", key);
            Some(trigger.signal_due().await)
        })
    }

    pub async fn cancel(&self, key: Uuid) -> bool {
        match self.alarms.lock().await.by_key.remove(&key) {
            Some(alarm) => {
                alarm.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Registrations still waiting for their time.
    pub async fn pending(&self) -> usize {
        self.alarms.lock().await.by_key.len()
    }

    pub async fn shutdown(&self) {
        let mut alarms = self.alarms.lock().await;
        for (_, alarm) in alarms.by_key.drain() {
            alarm.cancel.cancel();
        }
    }
}
