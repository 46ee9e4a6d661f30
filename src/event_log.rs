//! Session event log and the bounded recent-events window
//!
//! The log is append-only for the lifetime of a session. Its backing buffer is recycled
//! through [`EventLogPool`] so repeated sessions reuse one allocation.

use crate::types::BehaviorEvent;
use std::collections::VecDeque;

/// Released buffers above this capacity are shrunk before pooling
pub const MAX_RETAINED_CAPACITY: usize = 16_384;

/// Append-only store of the active session's events
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<BehaviorEvent>,
}

impl EventLog {
    fn from_buffer(mut buffer: Vec<BehaviorEvent>) -> Self {
        buffer.clear();
        Self { events: buffer }
    }

    pub fn append(&mut self, event: BehaviorEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn as_slice(&self) -> &[BehaviorEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&BehaviorEvent> {
        self.events.last()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    /// Move every event out, leaving the buffer empty with its capacity intact
    pub fn take_events(&mut self) -> Vec<BehaviorEvent> {
        self.events.drain(..).collect()
    }
}

/// Recycles event log buffers between sessions
#[derive(Debug)]
pub struct EventLogPool {
    buffers: Vec<Vec<BehaviorEvent>>,
    max_pooled: usize,
}

impl Default for EventLogPool {
    fn default() -> Self {
        Self::new(2)
    }
}

impl EventLogPool {
    pub fn new(max_pooled: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(max_pooled),
            max_pooled,
        }
    }

    /// An empty log, reusing a pooled buffer when one is available
    pub fn acquire(&mut self) -> EventLog {
        match self.buffers.pop() {
            Some(buffer) => EventLog::from_buffer(buffer),
            None => EventLog::default(),
        }
    }

    /// Return a log's storage to the pool; its events are dropped
    pub fn release(&mut self, log: EventLog) {
        if self.buffers.len() >= self.max_pooled {
            return;
        }
        let mut buffer = log.events;
        buffer.clear();
        buffer.shrink_to(MAX_RETAINED_CAPACITY);
        self.buffers.push(buffer);
    }

    pub fn pooled(&self) -> usize {
        self.buffers.len()
    }
}

/// Fixed-capacity window of the most recent events; the oldest is dropped on overflow
#[derive(Debug, Clone)]
pub struct RecentEvents {
    capacity: usize,
    events: VecDeque<BehaviorEvent>,
}

impl RecentEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, event: BehaviorEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Newest first
    pub fn snapshot(&self) -> Vec<BehaviorEvent> {
        self.events.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
