//! Streaming metric accumulators
//!
//! Every accumulator updates in constant time per event (focus blocks append at most one
//! entry per qualifying run) and can be read at any point without being consumed.

pub mod focus;
pub mod interruption;
pub mod scroll;
pub mod segmenter;
pub mod timeline;
pub mod typing;
pub mod welford;

pub use focus::{FocusAccumulator, FocusBlock};
pub use interruption::InterruptionAccumulator;
pub use scroll::ScrollAccumulator;
pub use segmenter::{GapSegmenter, Segment, Step};
pub use timeline::{ActivityPartition, TimelineAccumulator};
pub use typing::{TypingAccumulator, TypingTotals};
pub use welford::Welford;

use crate::config::EngineThresholds;
use crate::types::{BehaviorEvent, BehaviorEventType, EventTimestamp};
use std::collections::BTreeMap;

/// All per-session accumulators, reset at every session start
#[derive(Debug, Clone)]
pub struct SessionAccumulators {
    start: EventTimestamp,
    counts: [u32; BehaviorEventType::ALL.len()],
    timeline: TimelineAccumulator,
    scroll: ScrollAccumulator,
    typing: TypingAccumulator,
    interruptions: InterruptionAccumulator,
    focus: FocusAccumulator,
}

impl SessionAccumulators {
    pub fn new(start: EventTimestamp, thresholds: &EngineThresholds) -> Self {
        Self {
            start,
            counts: [0; BehaviorEventType::ALL.len()],
            timeline: TimelineAccumulator::new(start.monotonic_ms, thresholds.idle_threshold_ms),
            scroll: ScrollAccumulator::new(thresholds.idle_threshold_ms),
            typing: TypingAccumulator::new(
                thresholds.typing_gap_ms,
                thresholds.deep_typing_min_ms,
            ),
            interruptions: InterruptionAccumulator::new(),
            focus: FocusAccumulator::new(
                thresholds.focus_break_gap_ms,
                thresholds.deep_focus_min_ms,
            ),
        }
    }

    /// Feed one accepted event. A late event is observed at the latest time already seen,
    /// so every accumulator sees non-decreasing timestamps.
    pub fn update(&mut self, event: &BehaviorEvent) {
        let cursor = self.timeline.last_event_ms().unwrap_or(self.start.monotonic_ms);
        if event.timestamp.monotonic_ms < cursor {
            let mut clamped = event.clone();
            clamped.timestamp.monotonic_ms = cursor;
            self.observe(&clamped);
        } else {
            self.observe(event);
        }
    }

    fn observe(&mut self, event: &BehaviorEvent) {
        self.counts[event.event_type.index()] += 1;
        self.timeline.observe(event.timestamp.monotonic_ms);
        self.interruptions.observe(event);
        self.focus.observe(event);

        match event.event_type {
            BehaviorEventType::Scroll => self.scroll.observe(event),
            BehaviorEventType::Typing => self.typing.observe(event),
            _ => {}
        }
    }

    pub fn start(&self) -> EventTimestamp {
        self.start
    }

    pub fn count(&self, event_type: BehaviorEventType) -> u32 {
        self.counts[event_type.index()]
    }

    pub fn total_events(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Counts keyed by display name, only for types that occurred
    pub fn counts_by_type(&self) -> BTreeMap<String, u32> {
        BehaviorEventType::ALL
            .iter()
            .filter(|t| self.count(**t) > 0)
            .map(|t| (t.name().to_string(), self.count(*t)))
            .collect()
    }

    /// Session start to the last accepted event
    pub fn elapsed_to_last_event_ms(&self) -> u64 {
        self.timeline
            .last_event_ms()
            .map(|last| last.saturating_sub(self.start.monotonic_ms))
            .unwrap_or(0)
    }

    pub fn timeline(&self) -> &TimelineAccumulator {
        &self.timeline
    }

    pub fn scroll(&self) -> &ScrollAccumulator {
        &self.scroll
    }

    pub fn typing(&self) -> &TypingAccumulator {
        &self.typing
    }

    pub fn interruptions(&self) -> &InterruptionAccumulator {
        &self.interruptions
    }

    pub fn focus(&self) -> &FocusAccumulator {
        &self.focus
    }
}
