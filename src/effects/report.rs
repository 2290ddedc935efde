use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EffectKind;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FireSource {
    /// `Segment::fire_now`, no trigger involved.
    Direct,
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RunStatus {
    Completed,
    /// The run never started executing effects.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum EffectStatus {
    Executed,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectOutcome {
    pub index: usize,
    pub kind: EffectKind,
    pub status: EffectStatus,
}

/// Record of one run of a segment's effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub segment: String,
    pub source: FireSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub outcomes: Vec<EffectOutcome>,
}

impl RunReport {
    pub(crate) fn skipped(segment: &str, source: FireSource, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            segment: segment.to_string(),
            source,
            started_at: now,
            finished_at: now,
            status: RunStatus::Skipped {
                reason: reason.into(),
            },
            outcomes: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn executed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == EffectStatus::Executed)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, EffectStatus::Skipped { .. }))
            .count()
    }

    /// Kinds of the effects that actually executed, in run order.
    pub fn executed_kinds(&self) -> Vec<EffectKind> {
        self.outcomes
            .iter()
            .filter(|o| o.status == EffectStatus::Executed)
            .map(|o| o.kind)
            .collect()
    }
}
