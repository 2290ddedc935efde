//! Trigger/effect engine for user-defined segments.
//!
//! A [`Segment`] is a named list of [`Effect`]s plus a [`TriggerConfig`]. Arming
//! a segment builds a [`Trigger`] bound to a snapshot of its effects; firing the
//! trigger (or calling [`Segment::fire_now`]) drives the [`EffectRunner`].

pub mod definitions;
pub mod effects;
pub mod error;
pub mod haptics;
pub mod scheduler;
pub mod segment;
pub mod settings;
pub mod trigger;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use log::{error, info, warn};
use tokio::task::JoinHandle;

pub use definitions::SegmentDefinition;
pub use effects::{Effect, EffectKind, EffectRunner, FireSource, RunReport, RunStatus};
pub use error::{EngineError, ValidationError};
pub use haptics::{HapticBackend, HapticsHandle, LogHaptics, NoHaptics, Vibrator};
pub use scheduler::AlarmClock;
pub use segment::{Segment, SegmentBuilder};
pub use settings::{EngineSettings, SettingsStore};
pub use trigger::{
    DueOutcome, ManualTrigger, ScheduledTrigger, Trigger, TriggerConfig, TriggerFactory,
    TriggerKind,
};

const DEFAULT_SETTINGS_FILE: &str = "cadence-settings.json";

type PendingRun = JoinHandle<Result<Option<RunReport>, EngineError>>;

/// Desktop entry point: arm every segment from the definitions file given as
/// the first argument (or the built-in demo set) and wait for them to run.
pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Cadence starting up...");

    let settings_path = std::env::var("CADENCE_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = SettingsStore::new(settings_path)?;

    let definitions = match std::env::args_os().nth(1) {
        Some(path) => definitions::load_definitions(&PathBuf::from(path))?,
        None => definitions::demo_definitions(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(drive(definitions, settings.engine()))
}

async fn drive(
    definitions: Vec<SegmentDefinition>,
    settings: EngineSettings,
) -> anyhow::Result<()> {
    let haptics = Arc::new(HapticsHandle::new(LogHaptics::default()));
    let runner = EffectRunner::new(haptics.clone(), settings);
    let clock = AlarmClock::new();

    // Segments stay alive until every run is done; dropping one disarms it.
    let mut segments = Vec::with_capacity(definitions.len());
    let mut pending: Vec<(String, PendingRun)> = Vec::new();

    for definition in definitions {
        let mut segment = definition.into_segment(runner.clone())?;
        let trigger = segment
            .arm()
            .with_context(|| format!("cannot arm segment '{}'", segment.name()))?;

        let handle: PendingRun = match trigger {
            Trigger::Manual(manual) => {
                tokio::spawn(async move { manual.activate().await.map(Some) })
            }
            Trigger::Scheduled(scheduled) => {
                let alarm = clock.register(segment.id(), scheduled).await;
                tokio::spawn(async move {
                    match alarm.await {
                        Ok(Some(DueOutcome::Fired(result))) => result.map(Some),
                        Ok(_) => Ok(None),
                        Err(err) => {
                            error!("alarm task failed: {err}");
                            Ok(None)
                        }
                    }
                })
            }
        };

        pending.push((segment.name().to_string(), handle));
        segments.push(segment);
    }

    for (name, handle) in pending {
        match handle.await.context("segment task panicked")? {
            Ok(Some(report)) => info!(
                "'{}' finished: {} effects executed, {} skipped",
                name,
                report.executed_count(),
                report.skipped_count()
            ),
            Ok(None) => warn!("'{}' did not fire", name),
            Err(err) => error!("'{}' failed: {}", name, err),
        }
    }

    info!("{} vibrations requested", haptics.requested());
    Ok(())
}
