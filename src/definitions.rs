use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    effects::{Effect, EffectRunner},
    error::ValidationError,
    segment::Segment,
    trigger::TriggerConfig,
};

/// Segment fields as handed over by a caller, e.g. read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDefinition {
    pub name: String,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

impl SegmentDefinition {
    pub fn into_segment(self, runner: EffectRunner) -> Result<Segment, ValidationError> {
        Segment::new(self.name, self.effects, self.trigger, runner)
    }
}

pub fn load_definitions(path: &Path) -> Result<Vec<SegmentDefinition>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read segments from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse segments in {}", path.display()))
}

/// Used when no definitions file is given: one segment fired by hand and one
/// scheduled a few seconds out.
pub fn demo_definitions() -> Vec<SegmentDefinition> {
    vec![
        SegmentDefinition {
            name: "Breathing".to_string(),
            effects: vec![Effect::Vibrate, Effect::pause(4), Effect::Vibrate],
            trigger: TriggerConfig::manual(0),
        },
        SegmentDefinition {
            name: "Stretch reminder".to_string(),
            effects: vec![Effect::Vibrate, Effect::pause(1), Effect::Vibrate],
            trigger: TriggerConfig::scheduled(Utc::now() + Duration::seconds(3), true),
        },
    ]
}
