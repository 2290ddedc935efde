use std::{future::Future, sync::Arc};

use chrono::Utc;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    error::{EngineError, Result},
    haptics::Vibrator,
    settings::EngineSettings,
};

use super::{Effect, EffectOutcome, EffectStatus, FireSource, RunReport, RunStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Executes effect lists strictly in order.
///
/// Only Pause suspends, and it does so on the tokio timer, so any number of
/// runs can be in progress on the same runtime. The cancellation token is
/// checked before every effect and raced against every Pause.
#[derive(Clone)]
pub struct EffectRunner {
    vibrator: Arc<dyn Vibrator>,
    settings: EngineSettings,
}

impl EffectRunner {
    pub fn new(vibrator: Arc<dyn Vibrator>, settings: EngineSettings) -> Self {
        Self { vibrator, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        segment: &str,
        effects: &[Effect],
        source: FireSource,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let total = effects.len();
        self.run_steps(segment, effects, source, cancel, move |index, effect| {
            self.execute(index, total, effect, cancel)
        })
        .await
    }

    /// The ordered loop behind [`run`](EffectRunner::run). `step` executes one
    /// effect; its first error aborts the run and effects already executed
    /// stay executed.
    async fn run_steps<'a, F, Fut>(
        &self,
        segment: &str,
        effects: &'a [Effect],
        source: FireSource,
        cancel: &CancellationToken,
        mut step: F,
    ) -> Result<RunReport>
    where
        F: FnMut(usize, &'a Effect) -> Fut,
        Fut: Future<Output = Result<EffectStatus>>,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = effects.len();
        let mut outcomes = Vec::with_capacity(total);

        log_info!(
            "run {} of '{}' starting ({} effects, {:?})",
            run_id,
            segment,
            total,
            source
        );

        for (index, effect) in effects.iter().enumerate() {
            if cancel.is_cancelled() {
                log_info!("run {} cancelled before effect {}", run_id, index);
                return Err(EngineError::Cancelled {
                    completed: index,
                    total,
                });
            }

            let status = match step(index, effect).await {
                Ok(status) => status,
                Err(err) => {
                    log_warn!("run {} of '{}' aborted: {}", run_id, segment, err);
                    return Err(err);
                }
            };

            outcomes.push(EffectOutcome {
                index,
                kind: effect.kind(),
                status,
            });
        }

        log_info!("run {} of '{}' completed", run_id, segment);

        Ok(RunReport {
            run_id,
            segment: segment.to_string(),
            source,
            started_at,
            finished_at: Utc::now(),
            status: RunStatus::Completed,
            outcomes,
        })
    }

    async fn execute(
        &self,
        index: usize,
        total: usize,
        effect: &Effect,
        cancel: &CancellationToken,
    ) -> Result<EffectStatus> {
        match effect {
            Effect::Vibrate => Ok(self.vibrate()),
            Effect::Pause { duration_seconds } => {
                if self.pause(*duration_seconds, cancel).await {
                    Ok(EffectStatus::Executed)
                } else {
                    Err(EngineError::Cancelled {
                        completed: index,
                        total,
                    })
                }
            }
        }
    }

    fn vibrate(&self) -> EffectStatus {
        if !self.vibrator.is_available() {
            log_warn!("vibration unavailable on this device, skipping");
            return EffectStatus::Skipped {
                reason: "vibration unavailable".to_string(),
            };
        }

        self.vibrator.vibrate(self.settings.vibrate_duration_ms);
        EffectStatus::Executed
    }

    /// Returns `false` when cancelled before the full duration elapsed.
    async fn pause(&self, duration_seconds: u32, cancel: &CancellationToken) -> bool {
        if duration_seconds == 0 {
            log_debug!("zero-length pause, continuing");
            return true;
        }

        log_debug!("pausing for {} seconds", duration_seconds);
        let start = Instant::now();

        for elapsed in 1..=duration_seconds {
            if self.settings.pause_countdown_logs {
                log_debug!("countdown: {} seconds remaining", duration_seconds - elapsed + 1);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log_debug!("pause interrupted after {:?}", start.elapsed());
                    return false;
                }
                _ = time::sleep_until(start + Duration::from_secs(u64::from(elapsed))) => {}
            }
        }

        log_debug!("pause completed");
        true
    }
}
