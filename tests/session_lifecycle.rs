use std::sync::Arc;
use std::thread;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use synheart_behavior::{
    metric_keys, BehaviorConfig, BehaviorEngine, BehaviorError, BehaviorEvent, BehaviorEventType, Clock,
    DeviceSample, EventTimestamp, HostInfo, ManualClock, Orientation, SequentialSessionIds, SystemState,
};

fn replay_engine(config: BehaviorConfig) -> (BehaviorEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
    ));
    let engine = BehaviorEngine::configure(config)
        .unwrap()
        .with_clock(clock.clone())
        .with_id_generator(Arc::new(SequentialSessionIds::new("test")));
    engine.initialize().unwrap();
    engine.set_host_info(HostInfo {
        os: Some("Android 14".to_string()),
        app_id: Some("ai.synheart.demo".to_string()),
        app_name: Some("Demo".to_string()),
    });
    (engine, clock)
}

/// A recorded mixed session: scrolling, a notification, an app switch and typing
fn recorded_session(clock: &ManualClock) -> Vec<BehaviorEvent> {
    let mut events = Vec::new();
    let mut push = |kind: BehaviorEventType, ms: u64| {
        events.push(BehaviorEvent::new(kind, clock.at_offset(ms)));
    };

    for ms in [0, 100, 150, 600, 650] {
        push(BehaviorEventType::Scroll, ms);
    }
    push(BehaviorEventType::Notification, 5_000);
    push(BehaviorEventType::AppSwitch, 9_000);
    push(BehaviorEventType::Tap, 9_400);
    for ms in [12_000, 12_180, 12_400, 12_550] {
        push(BehaviorEventType::Typing, ms);
    }
    push(BehaviorEventType::Clipboard, 20_000);

    events[0].metrics.insert(metric_keys::DIRECTION, "down");
    events[1].metrics.insert(metric_keys::DIRECTION, "up");
    events[2].metrics.insert(metric_keys::VELOCITY, 420.0);
    events[5].metrics.insert(metric_keys::ACTION, "ignored");
    events[10].metrics.insert(metric_keys::IS_CORRECTION, true);
    events
}

#[test]
fn test_recorded_session_is_deterministic() {
    let summaries: Vec<String> = (0..2)
        .map(|_| {
            let (engine, clock) = replay_engine(BehaviorConfig::default());
            engine.set_system_state(SystemState {
                internet_state: true,
                do_not_disturb: false,
                charging: false,
            });
            engine.start_session().unwrap();
            engine.record_device_sample(DeviceSample {
                screen_brightness: Some(0.7),
                orientation: Some(Orientation::Portrait),
            });
            for event in recorded_session(&clock) {
                engine.ingest(event);
            }
            clock.advance(30_000);
            engine.end_session("test-1").unwrap().to_json().unwrap()
        })
        .collect();

    assert_eq!(summaries[0], summaries[1]);
}

#[test]
fn test_recorded_session_summary() {
    let (engine, clock) = replay_engine(BehaviorConfig::default());
    let handle = engine.start_session().unwrap();
    for event in recorded_session(&clock) {
        engine.ingest(event);
    }

    let stats = engine.current_stats();
    assert_eq!(stats, engine.current_stats());
    assert!(stats.stability_index.is_some());

    clock.advance(60_000);
    let summary = engine.end_session(&handle.session_id).unwrap();

    assert_eq!(summary.session_id, "test-1");
    assert_eq!(summary.duration_ms, 60_000);
    assert!(!summary.micro_session);
    assert_eq!(summary.activity_summary.total_events, 13);
    assert_eq!(summary.activity_summary.app_switch_count, 1);
    assert_eq!(summary.activity_summary.events_by_type.get("SCROLL"), Some(&5));

    assert_eq!(summary.notification_summary.notification_count, 1);
    assert_eq!(summary.notification_summary.notification_ignored, 1);
    assert_eq!(summary.notification_summary.notification_ignore_rate, 1.0);

    let typing = summary.typing_session_summary.unwrap();
    assert_eq!(typing.typing_session_count, 1);
    assert_eq!(typing.total_typing_duration_ms, 550);
    assert!((typing.correction_rate - 0.25).abs() < 1e-9);

    let metrics = summary.behavioral_metrics;
    assert_eq!(metrics.task_switch_cost_ms, 400);
    assert!((metrics.idle_time_ratio + metrics.active_time_ratio - 1.0).abs() < 1e-9);
    assert!(metrics.deep_focus_blocks.is_empty());
    assert!(metrics.fragmentation_index.is_some());
}

#[test]
fn test_concurrent_ingest_keeps_every_accepted_event() {
    let (engine, clock) = replay_engine(BehaviorConfig::default());
    let engine = Arc::new(engine);
    let handle = engine.start_session().unwrap();

    // Each producer stamps its own events; stamps interleave across workers and arrive in
    // whatever order the lock is won
    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            let clock = Arc::clone(&clock);
            thread::spawn(move || {
                for i in 0..250u64 {
                    let kind = if (worker + i) % 2 == 0 {
                        BehaviorEventType::Tap
                    } else {
                        BehaviorEventType::Swipe
                    };
                    let stamp = clock.at_offset(1_000 + i * 4 + worker);
                    engine.ingest(BehaviorEvent::new(kind, stamp));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let (summary, events) = engine.end_session_with_events(&handle.session_id).unwrap();
    let diagnostics = engine.diagnostics();
    assert_eq!(diagnostics.malformed_events, 0);
    assert_eq!(diagnostics.accepted_events, 1_000);
    assert_eq!(summary.activity_summary.total_events, 1_000);
    assert_eq!(events.len(), 1_000);
    assert_eq!(summary.duration_ms, 1_999);
}

#[test]
fn test_producers_stamping_from_system_clock_lose_nothing() {
    let engine = Arc::new(BehaviorEngine::configure(BehaviorConfig::default()).unwrap());
    engine.initialize().unwrap();
    engine.set_host_info(HostInfo::new("Android 14"));
    let handle = engine.start_session().unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let stamp = engine.now();
                    engine.ingest(BehaviorEvent::new(BehaviorEventType::Tap, stamp));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let (summary, events) = engine.end_session_with_events(&handle.session_id).unwrap();
    assert_eq!(engine.diagnostics().malformed_events, 0);
    assert_eq!(summary.activity_summary.total_events, 8_000);
    assert_eq!(events.len(), 8_000);
}

#[test]
fn test_end_while_producers_run_keeps_accepted_events() {
    let engine = Arc::new(BehaviorEngine::configure(BehaviorConfig::default()).unwrap());
    engine.initialize().unwrap();
    engine.set_host_info(HostInfo::new("Android 14"));
    let handle = engine.start_session().unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let stamp = engine.now();
                    engine.ingest(BehaviorEvent::new(BehaviorEventType::Swipe, stamp));
                }
            })
        })
        .collect();

    while engine.diagnostics().accepted_events < 100 {
        thread::yield_now();
    }
    let (summary, events) = engine.end_session_with_events(&handle.session_id).unwrap();
    for worker in workers {
        worker.join().unwrap();
    }

    let diagnostics = engine.diagnostics();
    assert_eq!(diagnostics.malformed_events, 0);
    assert_eq!(u64::from(summary.activity_summary.total_events), diagnostics.accepted_events);
    assert_eq!(events.len() as u64, diagnostics.accepted_events);
    assert_eq!(diagnostics.accepted_events + diagnostics.dropped_outside_session, 8_000);
}

#[test]
fn test_late_notification_is_summarized() {
    let (engine, clock) = replay_engine(BehaviorConfig::default());
    let handle = engine.start_session().unwrap();

    engine.ingest(BehaviorEvent::new(BehaviorEventType::Tap, clock.at_offset(200)));
    engine.ingest(BehaviorEvent::new(BehaviorEventType::Notification, clock.at_offset(150)));

    let summary = engine.end_session(&handle.session_id).unwrap();
    assert_eq!(engine.diagnostics().malformed_events, 0);
    assert_eq!(summary.activity_summary.total_events, 2);
    assert_eq!(summary.notification_summary.notification_count, 1);
    assert_eq!(summary.duration_ms, 200);
}

#[test]
fn test_rejected_events_are_excluded() {
    let (engine, clock) = replay_engine(BehaviorConfig::default());
    engine.ingest(BehaviorEvent::new(BehaviorEventType::Tap, clock.now()));

    clock.advance(1_000);
    let handle = engine.start_session().unwrap();
    engine.ingest(BehaviorEvent::new(BehaviorEventType::Tap, clock.now()));
    engine.ingest(
        BehaviorEvent::new(BehaviorEventType::Scroll, clock.at_offset(10))
            .with_metric(metric_keys::VELOCITY, f64::INFINITY),
    );
    engine.ingest(BehaviorEvent::new(
        BehaviorEventType::Tap,
        EventTimestamp::new(500, Utc::now()),
    ));
    engine.ingest_json(r#"{"event_type": "TAP"}"#);
    engine.ingest(BehaviorEvent::new(BehaviorEventType::Swipe, clock.at_offset(20)));

    let summary = engine.end_session(&handle.session_id).unwrap();
    let diagnostics = engine.diagnostics();
    assert_eq!(summary.activity_summary.total_events, 2);
    assert_eq!(diagnostics.accepted_events, 2);
    assert_eq!(diagnostics.dropped_outside_session, 1);
    assert_eq!(diagnostics.malformed_events, 3);

    assert!(matches!(
        engine.end_session(&handle.session_id),
        Err(BehaviorError::SessionNotFound(_))
    ));
}

#[test]
fn test_consecutive_sessions() {
    let (engine, clock) = replay_engine(BehaviorConfig::default());

    let first = engine.start_session().unwrap();
    engine.ingest(BehaviorEvent::new(BehaviorEventType::Tap, clock.at_offset(100)));
    clock.advance(2_000);
    engine.end_session(&first.session_id).unwrap();

    clock.advance(8_000);
    let second = engine.start_session().unwrap();
    assert_eq!(second.session_id, "test-2");
    assert!(engine.recent_events().is_empty());

    clock.advance(1_000);
    let summary = engine.end_session(&second.session_id).unwrap();
    assert_eq!(summary.session_spacing_ms, 8_000);
    assert_eq!(summary.activity_summary.total_events, 0);
    assert_eq!(summary.behavioral_metrics.scroll_velocity, None);
    assert_eq!(summary.behavioral_metrics.stability_index, None);
    assert_eq!(summary.behavioral_metrics.fragmentation_index, None);
}

#[tokio::test]
async fn test_subscriber_receives_events_in_order() {
    let (engine, clock) = replay_engine(BehaviorConfig::default());
    let engine = Arc::new(engine);
    let mut subscription = engine.subscribe();
    engine.start_session().unwrap();

    let consumer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while seen.len() < 20 {
            match subscription.next().await {
                Some(event) => seen.push(event.timestamp.monotonic_ms),
                None => break,
            }
        }
        seen
    });

    for ms in 0..20 {
        engine.ingest(BehaviorEvent::new(BehaviorEventType::Tap, clock.at_offset(ms)));
    }

    let seen = consumer.await.unwrap();
    assert_eq!(seen, (0..20).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_slow_subscriber_drops_oldest() {
    let mut config = BehaviorConfig::default();
    config.subscriber_capacity = 4;
    let (engine, clock) = replay_engine(config);
    let mut subscription = engine.subscribe();
    engine.start_session().unwrap();

    for ms in 0..10 {
        engine.ingest(BehaviorEvent::new(BehaviorEventType::Tap, clock.at_offset(ms)));
    }

    let first = subscription.next().await.unwrap();
    assert_eq!(first.timestamp.monotonic_ms, 6);
    assert_eq!(subscription.lagged(), 6);
    assert_eq!(subscription.drain().len(), 3);
    assert_eq!(engine.diagnostics().accepted_events, 10);
}
