//! Behavior engine
//!
//! One explicit, thread-safe engine instance per host. Session state sits behind a single
//! mutex so every ingest and session boundary is linearizable; context lives behind a second
//! mutex so device sampling never contends with the event path.

use crate::capability::{Capability, CapabilityGate, CapabilityReport};
use crate::clock::{Clock, SessionIdGenerator, SystemClock, UuidSessionIds};
use crate::config::BehaviorConfig;
use crate::context::{ContextStore, DeviceSample, HostInfo, MotionState, SystemState};
use crate::error::BehaviorError;
use crate::session::{IngestRejection, SessionHandle, SessionMachine};
use crate::subscription::EventSubscription;
use crate::summary::{BehaviorSessionSummary, BehaviorStats};
use crate::types::{BehaviorEvent, EventTimestamp};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Counters for events that never reached a session log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDiagnostics {
    pub accepted_events: u64,
    pub dropped_outside_session: u64,
    pub malformed_events: u64,
    pub filtered_events: u64,
    pub sessions_completed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    dropped_outside_session: AtomicU64,
    malformed: AtomicU64,
    filtered: AtomicU64,
    sessions_completed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            accepted_events: self.accepted.load(Ordering::Relaxed),
            dropped_outside_session: self.dropped_outside_session.load(Ordering::Relaxed),
            malformed_events: self.malformed.load(Ordering::Relaxed),
            filtered_events: self.filtered.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct BehaviorEngine {
    config: BehaviorConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn SessionIdGenerator>,
    initialized: AtomicBool,
    session: Mutex<SessionMachine>,
    context: Mutex<ContextStore>,
    capabilities: CapabilityGate,
    events_tx: broadcast::Sender<BehaviorEvent>,
    counters: Counters,
}

impl BehaviorEngine {
    /// Validate `config` and build an engine on the system clock with random session ids
    pub fn configure(config: BehaviorConfig) -> Result<Self, BehaviorError> {
        config.validate()?;
        let (events_tx, _) = broadcast::channel(config.subscriber_capacity);

        Ok(Self {
            clock: Arc::new(SystemClock::new()),
            ids: Arc::new(UuidSessionIds),
            initialized: AtomicBool::new(false),
            session: Mutex::new(SessionMachine::new(config.clone())),
            context: Mutex::new(ContextStore::new()),
            capabilities: CapabilityGate::new(config.enable_attention_signals),
            events_tx,
            counters: Counters::default(),
            config,
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the session id source
    pub fn with_id_generator(mut self, ids: Arc<dyn SessionIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Idempotent
    pub fn initialize(&self) -> Result<(), BehaviorError> {
        if !self.initialized.swap(true, Ordering::AcqRel) {
            info!(
                input = self.config.enable_input_signals,
                attention = self.config.enable_attention_signals,
                motion_lite = self.config.enable_motion_lite,
                "behavior engine initialized"
            );
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Current time in the engine's clock domain, for stamping events
    pub fn now(&self) -> EventTimestamp {
        self.clock.now()
    }

    pub fn start_session(&self) -> Result<SessionHandle, BehaviorError> {
        if !self.is_initialized() {
            return Err(BehaviorError::NotInitialized);
        }

        let mut session = lock(&self.session);
        if let Some(active) = session.active() {
            return Err(BehaviorError::AlreadyActive(active.handle().session_id.clone()));
        }

        let handle = session.start(self.ids.next_id(), self.clock.now())?;
        lock(&self.context).reset_session();
        info!(session_id = %handle.session_id, "session started");
        Ok(handle)
    }

    /// Fire-and-forget ingestion. Rejected events are counted, never reported.
    pub fn ingest(&self, event: BehaviorEvent) {
        let mut session = lock(&self.session);
        match session.ingest(event) {
            Ok(accepted) => {
                Counters::bump(&self.counters.accepted);
                // Sent under the state lock so delivery order matches ingestion order
                if self.events_tx.receiver_count() > 0 {
                    let _ = self.events_tx.send(accepted.clone());
                }
            }
            Err(IngestRejection::OutsideSession) => {
                Counters::bump(&self.counters.dropped_outside_session);
                debug!("event dropped outside session");
            }
            Err(IngestRejection::Filtered(event_type)) => {
                Counters::bump(&self.counters.filtered);
                debug!(%event_type, "event filtered by signal configuration");
            }
            Err(IngestRejection::Malformed(reason)) => {
                Counters::bump(&self.counters.malformed);
                debug!(%reason, "malformed event discarded");
            }
        }
    }

    /// Parse a JSON event and ingest it; unparseable input counts as malformed
    pub fn ingest_json(&self, json: &str) {
        match serde_json::from_str::<BehaviorEvent>(json) {
            Ok(event) => self.ingest(event),
            Err(e) => {
                Counters::bump(&self.counters.malformed);
                debug!(error = %e, "unparseable event discarded");
            }
        }
    }

    pub fn end_session(&self, session_id: &str) -> Result<BehaviorSessionSummary, BehaviorError> {
        self.end_session_with_events(session_id)
            .map(|(summary, _)| summary)
    }

    /// End the session and take ownership of its event log
    pub fn end_session_with_events(
        &self,
        session_id: &str,
    ) -> Result<(BehaviorSessionSummary, Vec<BehaviorEvent>), BehaviorError> {
        let mut session = lock(&self.session);
        let context = lock(&self.context).snapshot();

        match session.end(session_id, self.clock.now(), &context) {
            Ok((summary, events)) => {
                Counters::bump(&self.counters.sessions_completed);
                info!(
                    session_id,
                    events = summary.activity_summary.total_events,
                    duration_ms = summary.duration_ms,
                    "session ended"
                );
                Ok((summary, events))
            }
            Err(e) => {
                warn!(session_id, error = %e, "failed to end session");
                Err(e)
            }
        }
    }

    pub fn active_session(&self) -> Option<SessionHandle> {
        lock(&self.session).active().map(|s| s.handle().clone())
    }

    pub fn current_stats(&self) -> BehaviorStats {
        lock(&self.session).stats()
    }

    /// Newest first
    pub fn recent_events(&self) -> Vec<BehaviorEvent> {
        lock(&self.session).recent()
    }

    /// Live feed of accepted events, starting with the next one ingested
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.events_tx.subscribe())
    }

    pub fn report_capability(&self, capability: Capability, granted: bool) {
        debug!(?capability, granted, "capability reported");
        self.capabilities.report(capability, granted);
    }

    pub fn check_notification_permission(&self) -> bool {
        self.capabilities.is_available(Capability::NotificationListener)
    }

    pub fn check_call_permission(&self) -> bool {
        self.capabilities.is_available(Capability::CallState)
    }

    pub fn capabilities(&self) -> CapabilityReport {
        self.capabilities.report_all()
    }

    pub fn set_host_info(&self, host: HostInfo) {
        lock(&self.context).set_host_info(host);
    }

    pub fn set_system_state(&self, state: SystemState) {
        lock(&self.context).set_system_state(state);
    }

    pub fn record_device_sample(&self, sample: DeviceSample) {
        lock(&self.context).record_device_sample(sample);
    }

    /// Ignored unless motion-lite is enabled
    pub fn set_motion_state(&self, motion: MotionState) {
        if !self.config.enable_motion_lite {
            debug!("motion state ignored, motion-lite disabled");
            return;
        }
        lock(&self.context).set_motion_state(motion);
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SequentialSessionIds};
    use crate::types::{metric_keys, BehaviorEventType};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn engine_with(config: BehaviorConfig) -> (BehaviorEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(),
        ));
        let engine = BehaviorEngine::configure(config)
            .unwrap()
            .with_clock(clock.clone())
            .with_id_generator(Arc::new(SequentialSessionIds::new("session")));
        engine.initialize().unwrap();
        engine.set_host_info(HostInfo::new("Android 14"));
        (engine, clock)
    }

    fn engine() -> (BehaviorEngine, Arc<ManualClock>) {
        engine_with(BehaviorConfig::default())
    }

    fn event_at(clock: &ManualClock, kind: BehaviorEventType, ms: u64) -> BehaviorEvent {
        BehaviorEvent::new(kind, clock.at_offset(ms))
    }

    #[test]
    fn test_start_requires_initialize() {
        let engine = BehaviorEngine::configure(BehaviorConfig::default()).unwrap();
        assert!(matches!(
            engine.start_session(),
            Err(BehaviorError::NotInitialized)
        ));
        engine.initialize().unwrap();
        engine.initialize().unwrap();
        assert!(engine.start_session().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = BehaviorEngine::configure(BehaviorConfig::new(false, false, false));
        assert!(matches!(result, Err(BehaviorError::Configuration(_))));
    }

    #[test]
    fn test_ingest_while_idle_is_counted() {
        let (engine, clock) = engine();
        engine.ingest(event_at(&clock, BehaviorEventType::Tap, 10));
        assert_eq!(engine.diagnostics().dropped_outside_session, 1);
        assert_eq!(engine.current_stats(), BehaviorStats::default());
    }

    #[test]
    fn test_empty_session_ends_cleanly() {
        let (engine, clock) = engine();
        let handle = engine.start_session().unwrap();
        assert_eq!(handle.session_id, "session-1");

        clock.advance(5_000);
        let summary = engine.end_session(&handle.session_id).unwrap();
        assert_eq!(summary.activity_summary.total_events, 0);
        assert_eq!(summary.duration_ms, 5_000);
        assert_eq!(summary.behavioral_metrics.stability_index, None);

        assert!(matches!(
            engine.end_session(&handle.session_id),
            Err(BehaviorError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_second_start_is_rejected() {
        let (engine, _) = engine();
        engine.start_session().unwrap();
        assert!(matches!(
            engine.start_session(),
            Err(BehaviorError::AlreadyActive(ref id)) if id == "session-1"
        ));
    }

    #[test]
    fn test_wrong_session_id() {
        let (engine, _) = engine();
        engine.start_session().unwrap();
        assert!(matches!(
            engine.end_session("other"),
            Err(BehaviorError::SessionNotFound(ref id)) if id == "other"
        ));
        assert!(engine.active_session().is_some());
    }

    #[test]
    fn test_typing_correction_rate() {
        let (engine, clock) = engine();
        let handle = engine.start_session().unwrap();
        engine.ingest(event_at(&clock, BehaviorEventType::Typing, 100));
        engine.ingest(event_at(&clock, BehaviorEventType::Typing, 250));
        engine.ingest(
            event_at(&clock, BehaviorEventType::Typing, 400).with_metric(metric_keys::KEY, "Backspace"),
        );

        clock.advance(1_000);
        let summary = engine.end_session(&handle.session_id).unwrap();
        let typing = summary.typing_session_summary.unwrap();
        assert!((typing.correction_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.activity_summary.total_events, 3);
    }

    #[test]
    fn test_end_with_events_transfers_log() {
        let (engine, clock) = engine();
        let handle = engine.start_session().unwrap();
        for ms in [10, 20, 30] {
            engine.ingest(event_at(&clock, BehaviorEventType::Tap, ms));
        }

        let (summary, events) = engine.end_session_with_events(&handle.session_id).unwrap();
        assert_eq!(events.len() as u32, summary.activity_summary.total_events);
        assert_eq!(engine.diagnostics().accepted_events, 3);
        assert_eq!(engine.diagnostics().sessions_completed, 1);
    }

    #[test]
    fn test_missing_host_info_allows_retry() {
        let engine = BehaviorEngine::configure(BehaviorConfig::default()).unwrap();
        engine.initialize().unwrap();
        let handle = engine.start_session().unwrap();

        assert!(matches!(
            engine.end_session(&handle.session_id),
            Err(BehaviorError::IncompleteContext(_))
        ));
        engine.set_host_info(HostInfo::new("iOS 17"));
        assert_eq!(engine.end_session(&handle.session_id).unwrap().os, "iOS 17");
    }

    #[test]
    fn test_disabled_signal_class_is_filtered() {
        let (engine, clock) = engine_with(BehaviorConfig::new(true, false, false));
        let handle = engine.start_session().unwrap();
        engine.ingest(event_at(&clock, BehaviorEventType::AppSwitch, 10));
        engine.ingest(event_at(&clock, BehaviorEventType::Tap, 20));

        assert_eq!(engine.diagnostics().filtered_events, 1);
        let summary = engine.end_session(&handle.session_id).unwrap();
        assert_eq!(summary.activity_summary.app_switch_count, 0);
        assert_eq!(summary.activity_summary.total_events, 1);
    }

    #[test]
    fn test_ingest_json() {
        let (engine, clock) = engine();
        engine.start_session().unwrap();

        let event = event_at(&clock, BehaviorEventType::Scroll, 50).with_metric(metric_keys::VELOCITY, 120.0);
        engine.ingest_json(&serde_json::to_string(&event).unwrap());
        engine.ingest_json("{ not json");

        assert_eq!(engine.recent_events(), vec![event]);
        assert_eq!(engine.diagnostics().malformed_events, 1);
        assert_eq!(engine.current_stats().scroll_velocity, Some(120.0));
    }

    #[test]
    fn test_motion_state_requires_motion_lite() {
        let motion = MotionState {
            major_state: "walking".into(),
            major_state_pct: 0.7,
            ml_model: "motion-lite-v1".into(),
            state: vec!["walking".into(), "still".into()],
        };

        let (engine, _) = engine();
        let handle = engine.start_session().unwrap();
        engine.set_motion_state(motion.clone());
        assert!(engine.end_session(&handle.session_id).unwrap().motion_state.is_none());

        let (engine, _) = engine_with(BehaviorConfig::new(true, true, true));
        let handle = engine.start_session().unwrap();
        engine.set_motion_state(motion.clone());
        assert_eq!(
            engine.end_session(&handle.session_id).unwrap().motion_state,
            Some(motion)
        );
    }

    #[test]
    fn test_capability_checks() {
        let (engine, _) = engine();
        assert!(!engine.check_notification_permission());
        engine.report_capability(Capability::NotificationListener, true);
        assert!(engine.check_notification_permission());
        assert!(!engine.check_call_permission());

        let (engine, _) = engine_with(BehaviorConfig::new(true, false, false));
        engine.report_capability(Capability::CallState, true);
        assert!(!engine.check_call_permission());
    }

    #[test]
    fn test_subscriber_sees_accepted_events_only() {
        let (engine, clock) = engine();
        let mut sub = engine.subscribe();
        engine.ingest(event_at(&clock, BehaviorEventType::Tap, 1));

        engine.start_session().unwrap();
        engine.ingest(event_at(&clock, BehaviorEventType::Tap, 2));
        engine.ingest(event_at(&clock, BehaviorEventType::Swipe, 3));

        let times: Vec<u64> = sub.drain().iter().map(|e| e.timestamp.monotonic_ms).collect();
        assert_eq!(times, vec![2, 3]);
    }
}
