use std::sync::{Arc, Mutex};

use cadence_lib::{
    definitions::SegmentDefinition,
    trigger::{IgnoreReason, ManualStatus},
    AlarmClock, DueOutcome, Effect, EffectKind, EffectRunner, EngineError, EngineSettings,
    FireSource, Segment, TriggerConfig, TriggerKind, Vibrator,
};
use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::{self, Duration, Instant};

/// Records when each vibration was requested, relative to the test start.
struct TimelineVibrator {
    start: Instant,
    pulses: Mutex<Vec<(Duration, u64)>>,
}

impl TimelineVibrator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            pulses: Mutex::new(Vec::new()),
        })
    }

    fn offsets(&self) -> Vec<u64> {
        self.pulses
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| at.as_secs())
            .collect()
    }
}

impl Vibrator for TimelineVibrator {
    fn vibrate(&self, duration_ms: u64) {
        self.pulses
            .lock()
            .unwrap()
            .push((self.start.elapsed(), duration_ms));
    }
}

fn runner(vibrator: Arc<TimelineVibrator>) -> EffectRunner {
    EffectRunner::new(
        vibrator,
        EngineSettings {
            vibrate_duration_ms: 250,
            pause_countdown_logs: false,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn breathing_exercise_after_manual_delay() {
    let vibrator = TimelineVibrator::new();
    let mut segment = Segment::builder()
        .name("Breathing Exercise")
        .effects(vec![Effect::Vibrate, Effect::pause(4), Effect::Vibrate])
        .delay_seconds(2)
        .build(runner(vibrator.clone()))
        .unwrap();

    let trigger = segment.arm().unwrap();
    let manual = trigger.as_manual().unwrap().clone();
    assert_eq!(manual.status(), ManualStatus::Idle);

    let report = manual.activate().await.unwrap();

    assert_eq!(report.source, FireSource::Manual);
    assert!(report.is_completed());
    assert_eq!(
        report.executed_kinds(),
        vec![EffectKind::Vibrate, EffectKind::Pause, EffectKind::Vibrate]
    );
    assert_eq!(vibrator.offsets(), vec![2, 6]);
    assert!(vibrator.pulses.lock().unwrap().iter().all(|(_, ms)| *ms == 250));
    assert_eq!(trigger.fire_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn scheduled_reminder_enabled_before_due() {
    let vibrator = TimelineVibrator::new();
    let mut segment = Segment::new(
        "Stretch",
        vec![Effect::Vibrate],
        TriggerConfig::scheduled(Utc::now() + ChronoDuration::seconds(30), false),
        runner(vibrator.clone()),
    )
    .unwrap();
    let clock = AlarmClock::new();

    let trigger = segment.arm().unwrap();
    let scheduled = trigger.as_scheduled().unwrap().clone();
    let mut enabled = scheduled.subscribe_enabled();
    assert!(!*enabled.borrow());

    let alarm = clock.register(segment.id(), scheduled.clone()).await;
    time::sleep(Duration::from_secs(10)).await;
    scheduled.enable();
    enabled.changed().await.unwrap();
    assert!(*enabled.borrow_and_update());

    match alarm.await.unwrap() {
        Some(DueOutcome::Fired(Ok(report))) => {
            assert_eq!(report.source, FireSource::Scheduled);
            assert_eq!(report.executed_count(), 1);
        }
        other => panic!("unexpected alarm outcome: {other:?}"),
    }
    assert_eq!(vibrator.offsets().len(), 1);
    assert!(!scheduled.is_enabled());
}

#[tokio::test(start_paused = true)]
async fn disabling_before_due_suppresses_the_run() {
    let vibrator = TimelineVibrator::new();
    let mut segment = Segment::new(
        "Quiet",
        vec![Effect::Vibrate],
        TriggerConfig::scheduled(Utc::now() + ChronoDuration::seconds(20), true),
        runner(vibrator.clone()),
    )
    .unwrap();
    let clock = AlarmClock::new();

    let trigger = segment.arm().unwrap();
    let scheduled = trigger.as_scheduled().unwrap().clone();
    let alarm = clock.register(segment.id(), scheduled.clone()).await;

    time::sleep(Duration::from_secs(5)).await;
    scheduled.disable();

    assert!(matches!(
        alarm.await.unwrap(),
        Some(DueOutcome::Ignored(IgnoreReason::Disabled))
    ));
    assert!(vibrator.offsets().is_empty());
    assert_eq!(trigger.fire_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn disabling_mid_run_lets_the_run_finish() {
    let vibrator = TimelineVibrator::new();
    let mut segment = Segment::new(
        "Long",
        vec![Effect::Vibrate, Effect::pause(3), Effect::Vibrate],
        TriggerConfig::scheduled(Utc::now(), true),
        runner(vibrator.clone()),
    )
    .unwrap();

    let trigger = segment.arm().unwrap();
    let scheduled = trigger.as_scheduled().unwrap().clone();
    let due = tokio::spawn({
        let scheduled = scheduled.clone();
        async move { scheduled.signal_due().await }
    });

    time::sleep(Duration::from_secs(1)).await;
    assert!(segment.is_running());
    scheduled.disable();

    match due.await.unwrap() {
        DueOutcome::Fired(Ok(report)) => assert!(report.is_completed()),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(vibrator.offsets(), vec![0, 3]);
}

#[tokio::test(start_paused = true)]
async fn segments_run_independently() {
    let vibrator = TimelineVibrator::new();
    let fast = Segment::new(
        "Fast",
        vec![Effect::pause(1), Effect::Vibrate],
        TriggerConfig::default(),
        runner(vibrator.clone()),
    )
    .unwrap();
    let slow = Segment::new(
        "Slow",
        vec![Effect::pause(5), Effect::Vibrate],
        TriggerConfig::default(),
        runner(vibrator.clone()),
    )
    .unwrap();

    let (fast_report, slow_report) = tokio::join!(fast.fire_now(), slow.fire_now());

    assert!(fast_report.unwrap().is_completed());
    assert!(slow_report.unwrap().is_completed());
    assert_eq!(vibrator.offsets(), vec![1, 5]);
}

#[tokio::test(start_paused = true)]
async fn editing_the_trigger_disarms_a_pending_activation() {
    let vibrator = TimelineVibrator::new();
    let mut segment = Segment::new(
        "Editable",
        vec![Effect::Vibrate],
        TriggerConfig::manual(10),
        runner(vibrator.clone()),
    )
    .unwrap();

    let trigger = segment.arm().unwrap();
    let manual = trigger.as_manual().unwrap().clone();
    let pending = tokio::spawn(async move { manual.activate().await });

    time::sleep(Duration::from_secs(3)).await;
    segment.update_trigger_config(TriggerConfig::scheduled(Utc::now(), false));

    assert!(matches!(pending.await.unwrap(), Err(EngineError::Disarmed)));
    assert!(vibrator.offsets().is_empty());
    assert_eq!(segment.trigger_config().kind(), TriggerKind::Scheduled);
}

#[tokio::test(start_paused = true)]
async fn definitions_from_json_drive_segments() {
    let json = r#"{
        "name": "Box breathing",
        "effects": [
            { "type": "vibrate" },
            { "type": "pause", "durationSeconds": 4 },
            { "type": "vibrate" },
            { "type": "pause", "durationSeconds": 0 }
        ],
        "trigger": { "type": "manual", "delaySeconds": 0 }
    }"#;
    let definition: SegmentDefinition = serde_json::from_str(json).unwrap();
    let vibrator = TimelineVibrator::new();

    let segment = definition.into_segment(runner(vibrator.clone())).unwrap();
    let report = segment.fire_now().await.unwrap();

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(vibrator.offsets(), vec![0, 4]);
}
