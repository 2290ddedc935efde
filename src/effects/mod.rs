//! Effects: the individual side-effecting steps a segment runs.

pub mod report;
pub mod runner;

use serde::{Deserialize, Serialize};

pub use report::{EffectOutcome, EffectStatus, FireSource, RunReport, RunStatus};
pub use runner::EffectRunner;

/// One step of a segment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    /// Ask the device to vibrate once.
    Vibrate,
    /// Suspend the run for a number of seconds.
    #[serde(rename_all = "camelCase")]
    Pause { duration_seconds: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    Vibrate,
    Pause,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Vibrate => "vibrate",
            EffectKind::Pause => "pause",
        }
    }
}

impl Effect {
    pub fn pause(duration_seconds: u32) -> Self {
        Effect::Pause { duration_seconds }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Vibrate => EffectKind::Vibrate,
            Effect::Pause { .. } => EffectKind::Pause,
        }
    }

    /// Label shown next to the effect in an effect list.
    pub fn description(&self) -> String {
        match self {
            Effect::Vibrate => "Vibrate".to_string(),
            Effect::Pause { duration_seconds: 1 } => "Pause for 1 second".to_string(),
            Effect::Pause { duration_seconds } => {
                format!("Pause for {} seconds", duration_seconds)
            }
        }
    }
}
