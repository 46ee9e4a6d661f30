//! Keystroke segmentation into typing sessions

use super::segmenter::{GapSegmenter, Segment, Step};
use super::welford::Welford;
use crate::types::BehaviorEvent;

#[derive(Debug, Clone, Default)]
struct TypingTally {
    sessions: u32,
    keystrokes: u32,
    duration_ms: u64,
    deep_blocks: u32,
    speed: Welford,
}

impl TypingTally {
    fn close(&mut self, session: Segment, deep_typing_min_ms: u64) {
        let duration_ms = session.duration_ms();
        self.sessions += 1;
        self.keystrokes += session.events;
        self.duration_ms += duration_ms;
        if duration_ms > 0 {
            self.speed
                .push(session.events as f64 * 1000.0 / duration_ms as f64);
        }
        if duration_ms >= deep_typing_min_ms {
            self.deep_blocks += 1;
        }
    }
}

/// Typing metrics with the open typing session counted as closed
#[derive(Debug, Clone, PartialEq)]
pub struct TypingTotals {
    pub sessions: u32,
    pub keystrokes: u32,
    pub corrections: u32,
    pub total_duration_ms: u64,
    pub deep_blocks: u32,
    /// Mean keystrokes per second across sessions with a non-zero duration
    pub average_speed: f64,
    /// Inter-keystroke intervals inside typing sessions
    pub cadence: Welford,
}

impl TypingTotals {
    /// Session boundaries over all keystroke intervals
    pub fn fragmentation(&self) -> f64 {
        if self.keystrokes <= 1 {
            return 0.0;
        }
        let breaks = self.sessions.saturating_sub(1);
        (breaks as f64 / (self.keystrokes - 1) as f64).clamp(0.0, 1.0)
    }

    pub fn correction_rate(&self) -> f64 {
        if self.keystrokes == 0 {
            return 0.0;
        }
        self.corrections as f64 / self.keystrokes as f64
    }
}

#[derive(Debug, Clone)]
pub struct TypingAccumulator {
    deep_typing_min_ms: u64,
    sessions: GapSegmenter,
    closed: TypingTally,
    keystrokes: u32,
    corrections: u32,
    cadence: Welford,
}

impl TypingAccumulator {
    pub fn new(typing_gap_ms: u64, deep_typing_min_ms: u64) -> Self {
        Self {
            deep_typing_min_ms,
            sessions: GapSegmenter::new(typing_gap_ms),
            closed: TypingTally::default(),
            keystrokes: 0,
            corrections: 0,
            cadence: Welford::new(),
        }
    }

    pub fn observe(&mut self, event: &BehaviorEvent) {
        self.keystrokes += 1;
        if event.is_correction() {
            self.corrections += 1;
        }

        match self.sessions.observe(event.timestamp.monotonic_ms) {
            Step::First => {}
            Step::Continue { gap_ms } => self.cadence.push(gap_ms as f64),
            Step::Break { closed, .. } => self.closed.close(closed, self.deep_typing_min_ms),
        }
    }

    pub fn keystrokes(&self) -> u32 {
        self.keystrokes
    }

    pub fn totals(&self) -> TypingTotals {
        let mut tally = self.closed.clone();
        if let Some(open) = self.sessions.current() {
            tally.close(open, self.deep_typing_min_ms);
        }

        TypingTotals {
            sessions: tally.sessions,
            keystrokes: self.keystrokes,
            corrections: self.corrections,
            total_duration_ms: tally.duration_ms,
            deep_blocks: tally.deep_blocks,
            average_speed: tally.speed.mean().unwrap_or(0.0),
            cadence: self.cadence,
        }
    }
}
