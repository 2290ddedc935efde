use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    Manual,
    Scheduled,
}

/// When a segment should fire. Plain data: no callbacks, no runtime state.
///
/// A config is never edited in place; callers build a new value and hand it to
/// `Segment::update_trigger_config`. Switching variants therefore drops the
/// other variant's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TriggerConfig {
    /// Fire on demand, after `delay_seconds`.
    #[serde(rename_all = "camelCase")]
    Manual {
        #[serde(default)]
        delay_seconds: u32,
    },
    /// Fire when the scheduler reports `fire_at` has passed, if enabled.
    /// `fire_at` may be missing while the config is still being edited.
    #[serde(rename_all = "camelCase")]
    Scheduled {
        #[serde(default)]
        fire_at: Option<DateTime<Utc>>,
        #[serde(default)]
        enabled: bool,
    },
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig::Manual { delay_seconds: 0 }
    }
}

impl TriggerConfig {
    pub fn manual(delay_seconds: u32) -> Self {
        TriggerConfig::Manual { delay_seconds }
    }

    pub fn scheduled(fire_at: DateTime<Utc>, enabled: bool) -> Self {
        TriggerConfig::Scheduled {
            fire_at: Some(fire_at),
            enabled,
        }
    }

    /// Blank config for a freshly selected trigger type.
    pub fn default_for(kind: TriggerKind) -> Self {
        match kind {
            TriggerKind::Manual => TriggerConfig::Manual { delay_seconds: 0 },
            TriggerKind::Scheduled => TriggerConfig::Scheduled {
                fire_at: None,
                enabled: false,
            },
        }
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerConfig::Manual { .. } => TriggerKind::Manual,
            TriggerConfig::Scheduled { .. } => TriggerKind::Scheduled,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            TriggerConfig::Manual { .. } => Ok(()),
            TriggerConfig::Scheduled { fire_at: None, .. } => Err(ValidationError::MissingFireAt),
            TriggerConfig::Scheduled { .. } => Ok(()),
        }
    }

    pub fn delay_seconds(&self) -> Option<u32> {
        match self {
            TriggerConfig::Manual { delay_seconds } => Some(*delay_seconds),
            TriggerConfig::Scheduled { .. } => None,
        }
    }

    pub fn fire_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TriggerConfig::Scheduled { fire_at, .. } => *fire_at,
            TriggerConfig::Manual { .. } => None,
        }
    }

    pub fn enabled(&self) -> Option<bool> {
        match self {
            TriggerConfig::Scheduled { enabled, .. } => Some(*enabled),
            TriggerConfig::Manual { .. } => None,
        }
    }
}
