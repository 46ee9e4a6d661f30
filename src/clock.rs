//! Time sources and session id generation
//!
//! Producers stamp events from the same [`Clock`] the engine uses for session
//! boundaries, so every interval is measured on one monotonic axis.

use crate::types::EventTimestamp;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use uuid::Uuid;

pub trait Clock: Send + Sync {
    fn now(&self) -> EventTimestamp;
}

/// Monotonic milliseconds since construction paired with the system wall clock
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> EventTimestamp {
        EventTimestamp::new(self.origin.elapsed().as_millis() as u64, Utc::now())
    }
}

/// Externally driven clock for replays and tests
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<EventTimestamp>,
}

impl ManualClock {
    pub fn new(start: EventTimestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Clock at monotonic zero, anchored at `wall_clock`
    pub fn starting_at(wall_clock: DateTime<Utc>) -> Self {
        Self::new(EventTimestamp::new(0, wall_clock))
    }

    pub fn set(&self, ts: EventTimestamp) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = ts;
    }

    /// Move both clock parts forward by `ms`
    pub fn advance(&self, ms: u64) -> EventTimestamp {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.monotonic_ms += ms;
        current.wall_clock += Duration::milliseconds(ms as i64);
        *current
    }

    /// Timestamp `ms` after the clock's current reading, without moving it
    pub fn at_offset(&self, ms: u64) -> EventTimestamp {
        let current = *self.current.lock().unwrap_or_else(|e| e.into_inner());
        EventTimestamp::new(
            current.monotonic_ms + ms,
            current.wall_clock + Duration::milliseconds(ms as i64),
        )
    }
}

impl Clock for ManualClock {
    fn now(&self) -> EventTimestamp {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub trait SessionIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Default)]
pub struct UuidSessionIds;

impl SessionIdGenerator for UuidSessionIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// `prefix-1`, `prefix-2`, ... for reproducible replays
#[derive(Debug)]
pub struct SequentialSessionIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialSessionIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl SessionIdGenerator for SequentialSessionIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}
