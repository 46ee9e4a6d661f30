//! Session state machine
//!
//! `Idle -> Active -> Idle`. The machine owns the active session's event log and
//! accumulators exclusively; callers only ever see copies or the drained log.

use crate::accumulators::SessionAccumulators;
use crate::config::BehaviorConfig;
use crate::context::ContextSnapshot;
use crate::error::BehaviorError;
use crate::event_log::{EventLog, EventLogPool, RecentEvents};
use crate::reducer::{effective_end, ReductionInput, SummaryReducer};
use crate::stats::StatsProjector;
use crate::summary::{BehaviorSessionSummary, BehaviorStats};
use crate::types::{BehaviorEvent, BehaviorEventType, EventRejection, EventTimestamp};
use serde::{Deserialize, Serialize};

/// Returned by `start_session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub start_at: EventTimestamp,
}

#[derive(Debug)]
pub struct ActiveSession {
    handle: SessionHandle,
    log: EventLog,
    accumulators: SessionAccumulators,
}

impl ActiveSession {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn events(&self) -> &[BehaviorEvent] {
        self.log.as_slice()
    }

    pub fn accumulators(&self) -> &SessionAccumulators {
        &self.accumulators
    }
}

#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Active(ActiveSession),
}

/// Why an event did not reach the log
#[derive(Debug, Clone, PartialEq)]
pub enum IngestRejection {
    OutsideSession,
    Filtered(BehaviorEventType),
    Malformed(EventRejection),
}

#[derive(Debug)]
pub struct SessionMachine {
    config: BehaviorConfig,
    state: SessionState,
    pool: EventLogPool,
    recent: RecentEvents,
    last_session_end: Option<EventTimestamp>,
}

impl SessionMachine {
    pub fn new(config: BehaviorConfig) -> Self {
        let recent = RecentEvents::new(config.recent_window);
        Self {
            config,
            state: SessionState::Idle,
            pool: EventLogPool::default(),
            recent,
            last_session_end: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match &self.state {
            SessionState::Active(session) => Some(session),
            SessionState::Idle => None,
        }
    }

    pub fn start(&mut self, session_id: String, now: EventTimestamp) -> Result<SessionHandle, BehaviorError> {
        if let Some(active) = self.active() {
            return Err(BehaviorError::AlreadyActive(active.handle.session_id.clone()));
        }

        let handle = SessionHandle {
            session_id,
            start_at: now,
        };
        self.recent.clear();
        self.state = SessionState::Active(ActiveSession {
            handle: handle.clone(),
            log: self.pool.acquire(),
            accumulators: SessionAccumulators::new(now, &self.config.thresholds),
        });
        Ok(handle)
    }

    /// Validate, filter and append. On success returns the logged event.
    ///
    /// Producers stamp events before taking the engine lock, so an event may arrive after a
    /// later-stamped one. It is logged with its own timestamp; only events stamped before the
    /// session start are rejected.
    pub fn ingest(&mut self, event: BehaviorEvent) -> Result<&BehaviorEvent, IngestRejection> {
        let session = match &mut self.state {
            SessionState::Active(session) => session,
            SessionState::Idle => return Err(IngestRejection::OutsideSession),
        };

        event.validate().map_err(IngestRejection::Malformed)?;
        let start = session.handle.start_at.monotonic_ms;
        if event.timestamp.monotonic_ms < start {
            return Err(IngestRejection::Malformed(EventRejection::BeforeSessionStart {
                got: event.timestamp.monotonic_ms,
                start,
            }));
        }
        if !self.config.accepts(event.event_type) {
            return Err(IngestRejection::Filtered(event.event_type));
        }

        session.accumulators.update(&event);
        self.recent.push(event.clone());
        session.log.append(event);
        session
            .log
            .last()
            .ok_or(IngestRejection::OutsideSession)
    }

    /// Reduce and close the session. On error the session stays active.
    pub fn end(
        &mut self,
        session_id: &str,
        now: EventTimestamp,
        context: &ContextSnapshot,
    ) -> Result<(BehaviorSessionSummary, Vec<BehaviorEvent>), BehaviorError> {
        let session = match self.active() {
            Some(session) if session.handle.session_id == session_id => session,
            _ => return Err(BehaviorError::SessionNotFound(session_id.to_string())),
        };

        let summary = SummaryReducer::reduce(&ReductionInput {
            session_id,
            accumulators: &session.accumulators,
            events: session.log.as_slice(),
            context,
            end: now,
            previous_session_end: self.last_session_end,
            thresholds: &self.config.thresholds,
            motion_enabled: self.config.enable_motion_lite,
        })?;
        let end = effective_end(now, session.log.as_slice());

        let events = match std::mem::take(&mut self.state) {
            SessionState::Active(mut session) => {
                let events = session.log.take_events();
                self.pool.release(session.log);
                events
            }
            SessionState::Idle => Vec::new(),
        };
        self.last_session_end = Some(end);
        Ok((summary, events))
    }

    /// Live stats; all empty while idle
    pub fn stats(&self) -> BehaviorStats {
        self.active()
            .map(|session| StatsProjector::project(&session.accumulators))
            .unwrap_or_else(StatsProjector::idle)
    }

    /// Recent accepted events, newest first
    pub fn recent(&self) -> Vec<BehaviorEvent> {
        self.recent.snapshot()
    }

    pub fn pooled_logs(&self) -> usize {
        self.pool.pooled()
    }
}
