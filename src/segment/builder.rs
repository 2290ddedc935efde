use chrono::{DateTime, Utc};

use crate::{
    effects::{Effect, EffectRunner},
    error::ValidationError,
    trigger::{TriggerConfig, TriggerKind},
};

use super::Segment;

/// Collects segment fields one at a time, the way an edit form fills them in.
///
/// Fields for both trigger kinds can be set; only the ones belonging to the
/// selected kind end up in the built [`TriggerConfig`].
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    name: String,
    effects: Vec<Effect>,
    trigger_kind: TriggerKind,
    delay_seconds: u32,
    fire_at: Option<DateTime<Utc>>,
    enabled: bool,
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self {
            name: String::new(),
            effects: Vec::new(),
            trigger_kind: TriggerKind::Manual,
            delay_seconds: 0,
            fire_at: None,
            enabled: false,
        }
    }
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn add_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }

    pub fn trigger_kind(mut self, kind: TriggerKind) -> Self {
        self.trigger_kind = kind;
        self
    }

    pub fn delay_seconds(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }

    pub fn fire_at(mut self, fire_at: Option<DateTime<Utc>>) -> Self {
        self.fire_at = fire_at;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        match self.trigger_kind {
            TriggerKind::Manual => TriggerConfig::Manual {
                delay_seconds: self.delay_seconds,
            },
            TriggerKind::Scheduled => TriggerConfig::Scheduled {
                fire_at: self.fire_at,
                enabled: self.enabled,
            },
        }
    }

    /// A scheduled kind without a fire time still builds; arming it fails
    /// until a time is set.
    pub fn build(self, runner: EffectRunner) -> Result<Segment, ValidationError> {
        let trigger_config = self.trigger_config();
        Segment::new(self.name, self.effects, trigger_config, runner)
    }
}
