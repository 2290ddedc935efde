pub mod builder;
mod run_slot;

use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use crate::{
    effects::{Effect, EffectRunner, RunReport},
    error::{EngineError, Result, ValidationError},
    trigger::{fire_callback, FireFuture, FireRequest, Trigger, TriggerConfig, TriggerFactory},
};

pub use builder::SegmentBuilder;
use run_slot::RunSlot;

/// What an armed trigger or `fire_now` needs to run the segment, captured by
/// value so the run does not observe later edits.
struct RunContext {
    segment: String,
    effects: Arc<[Effect]>,
    runner: EffectRunner,
    slot: Arc<RunSlot>,
}

/// A named, ordered list of effects plus the config describing when it fires.
///
/// Triggers snapshot the effect list when they are armed. After editing the
/// effects, call [`arm`](Segment::arm) again to get a trigger that runs the
/// new list; the old trigger keeps running the old one until it is replaced.
pub struct Segment {
    id: Uuid,
    name: String,
    effects: Vec<Effect>,
    trigger_config: TriggerConfig,
    runner: EffectRunner,
    slot: Arc<RunSlot>,
    armed: Option<Trigger>,
}

impl Segment {
    pub fn new(
        name: impl Into<String>,
        effects: Vec<Effect>,
        trigger_config: TriggerConfig,
        runner: EffectRunner,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: validate_name(name.into())?,
            effects,
            trigger_config,
            runner,
            slot: Arc::new(RunSlot::new()),
            armed: None,
        })
    }

    pub fn builder() -> SegmentBuilder {
        SegmentBuilder::new()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn trigger_config(&self) -> &TriggerConfig {
        &self.trigger_config
    }

    /// The trigger returned by the last successful [`arm`](Segment::arm), if
    /// it has not been disarmed since.
    pub fn armed(&self) -> Option<&Trigger> {
        self.armed.as_ref()
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = validate_name(name.into())?;
        Ok(())
    }

    /// Replace the trigger config. The trigger built from the old config is
    /// disarmed; call [`arm`](Segment::arm) to get one for the new config.
    pub fn update_trigger_config(&mut self, config: TriggerConfig) {
        self.disarm();
        self.trigger_config = config;
    }

    pub fn set_effects(&mut self, effects: Vec<Effect>) {
        self.effects = effects;
    }

    pub fn add_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn remove_effect(&mut self, index: usize) -> Result<Effect, ValidationError> {
        if index >= self.effects.len() {
            return Err(ValidationError::EffectIndex {
                index,
                len: self.effects.len(),
            });
        }
        Ok(self.effects.remove(index))
    }

    /// Build a fresh trigger for the current config and effects, replacing
    /// (and disarming) the previously armed one.
    pub fn arm(&mut self) -> Result<Trigger, ValidationError> {
        let context = Arc::new(self.run_context());
        let on_fire = fire_callback(move |request: FireRequest| execute(context.clone(), request));
        let trigger = TriggerFactory::create(&self.trigger_config, on_fire)?;

        if let Some(previous) = self.armed.replace(trigger.clone()) {
            previous.disarm();
        }

        info!(
            "armed {:?} trigger for segment '{}' ({} effects)",
            trigger.kind(),
            self.name,
            self.effects.len()
        );
        Ok(trigger)
    }

    pub fn disarm(&mut self) {
        if let Some(trigger) = self.armed.take() {
            debug!("disarming trigger of segment '{}'", self.name);
            trigger.disarm();
        }
    }

    /// Run the current effects right away, whatever the trigger config says.
    ///
    /// The returned future owns everything it needs, so it can be spawned.
    pub fn fire_now(&self) -> FireFuture {
        let context = Arc::new(self.run_context());
        Box::pin(execute(context, FireRequest::direct()))
    }

    /// Cancel the run in flight, if there is one.
    pub fn cancel_run(&self) -> bool {
        self.slot.cancel()
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_running()
    }

    fn run_context(&self) -> RunContext {
        RunContext {
            segment: self.name.clone(),
            effects: Arc::from(self.effects.as_slice()),
            runner: self.runner.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("effects", &self.effects)
            .field("trigger_config", &self.trigger_config)
            .field("armed", &self.armed)
            .finish()
    }
}

fn validate_name(name: String) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// One run of a segment: supersede whatever is in flight, wait for it to stop,
/// commit the start gate, then hand the effects to the runner.
///
/// A firing whose gate is already revoked returns a skipped report without
/// touching the run in flight.
async fn execute(context: Arc<RunContext>, request: FireRequest) -> Result<RunReport> {
    if request.gate.is_revoked() {
        return Ok(revoked(&context, &request));
    }

    let total = context.effects.len();
    let ticket = context.slot.begin();

    let Some(_exclusive) = ticket.exclusive().await else {
        info!("run of '{}' superseded before it started", context.segment);
        return Err(EngineError::Cancelled {
            completed: 0,
            total,
        });
    };

    if ticket.token().is_cancelled() {
        return Err(EngineError::Cancelled {
            completed: 0,
            total,
        });
    }

    if !request.gate.commit() {
        return Ok(revoked(&context, &request));
    }

    context
        .runner
        .run(&context.segment, &context.effects, request.source, ticket.token())
        .await
}

fn revoked(context: &RunContext, request: &FireRequest) -> RunReport {
    info!(
        "{:?} fire of '{}' revoked before any effect ran",
        request.source, context.segment
    );
    RunReport::skipped(
        &context.segment,
        request.source,
        "trigger disabled before the run started",
    )
}
