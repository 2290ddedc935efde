use crate::error::ValidationError;

use super::{FireCallback, ManualTrigger, ScheduledTrigger, Trigger, TriggerConfig};

/// Maps a [`TriggerConfig`] to the matching runtime [`Trigger`].
pub struct TriggerFactory;

impl TriggerFactory {
    /// Pure mapping; fields are copied verbatim. A `fire_at` in the past is
    /// accepted, deciding what to do with it is up to the scheduler.
    pub fn create(
        config: &TriggerConfig,
        on_fire: FireCallback,
    ) -> Result<Trigger, ValidationError> {
        match config {
            TriggerConfig::Manual { delay_seconds } => {
                Ok(Trigger::Manual(ManualTrigger::new(*delay_seconds, on_fire)))
            }
            TriggerConfig::Scheduled { fire_at, enabled } => {
                let fire_at = fire_at.ok_or(ValidationError::MissingFireAt)?;
                Ok(Trigger::Scheduled(ScheduledTrigger::new(
                    fire_at, *enabled, on_fire,
                )))
            }
        }
    }
}
