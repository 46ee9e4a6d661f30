//! Whole-session timing: bursts, inter-event intervals and the idle/active partition

use super::segmenter::GapSegmenter;
use super::welford::Welford;
use crate::features;

/// Session time split by the idle threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityPartition {
    pub active_ms: u64,
    pub idle_ms: u64,
    pub idle_segments: u32,
}

impl ActivityPartition {
    fn account(&mut self, gap_ms: u64, idle_threshold_ms: u64) {
        if gap_ms > idle_threshold_ms {
            self.idle_ms += gap_ms;
            self.idle_segments += 1;
        } else {
            self.active_ms += gap_ms;
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimelineAccumulator {
    idle_threshold_ms: u64,
    session_start_ms: u64,
    bursts: GapSegmenter,
    intervals: Welford,
    first_event_ms: Option<u64>,
    last_event_ms: Option<u64>,
    /// Partition up to the last event; the tail is added on read
    partition: ActivityPartition,
}

impl TimelineAccumulator {
    pub fn new(session_start_ms: u64, idle_threshold_ms: u64) -> Self {
        Self {
            idle_threshold_ms,
            session_start_ms,
            bursts: GapSegmenter::new(idle_threshold_ms),
            intervals: Welford::new(),
            first_event_ms: None,
            last_event_ms: None,
            partition: ActivityPartition::default(),
        }
    }

    pub fn observe(&mut self, at_ms: u64) {
        let previous = self.last_event_ms.unwrap_or(self.session_start_ms);
        let gap_ms = at_ms.saturating_sub(previous);
        self.partition.account(gap_ms, self.idle_threshold_ms);

        if self.last_event_ms.is_some() {
            self.intervals.push(gap_ms as f64);
        }

        self.bursts.observe(at_ms);
        self.first_event_ms.get_or_insert(at_ms);
        self.last_event_ms = Some(at_ms);
    }

    pub fn bursts(&self) -> u32 {
        self.bursts.segments()
    }

    pub fn last_event_ms(&self) -> Option<u64> {
        self.last_event_ms
    }

    /// First to last event
    pub fn event_span_ms(&self) -> u64 {
        match (self.first_event_ms, self.last_event_ms) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        }
    }

    pub fn intervals(&self) -> &Welford {
        &self.intervals
    }

    /// Active/idle split of `[session start, end_ms]`.
    ///
    /// A session without events is entirely idle.
    pub fn partition(&self, end_ms: u64) -> ActivityPartition {
        match self.last_event_ms {
            None => {
                let elapsed = end_ms.saturating_sub(self.session_start_ms);
                ActivityPartition {
                    active_ms: 0,
                    idle_ms: elapsed,
                    idle_segments: u32::from(elapsed > 0),
                }
            }
            Some(last) => {
                let mut partition = self.partition;
                partition.account(end_ms.saturating_sub(last), self.idle_threshold_ms);
                partition
            }
        }
    }

    /// Needs at least two intervals
    pub fn stability_index(&self) -> Option<f64> {
        self.intervals
            .moments(2)
            .map(|(mean, variance)| features::stability_index(mean, variance))
    }

    /// Needs at least two events
    pub fn fragmentation_index(&self) -> Option<f64> {
        if self.intervals.is_empty() {
            return None;
        }
        Some(features::fragmentation_index(
            self.bursts(),
            self.event_span_ms(),
            self.idle_threshold_ms,
        ))
    }

    /// Barabási burstiness of all inter-event gaps; 0.5 without data
    pub fn burstiness(&self) -> f64 {
        match (self.intervals.mean(), self.intervals.std_dev()) {
            (Some(mean), Some(std_dev)) => features::burstiness(mean, std_dev),
            _ => 0.5,
        }
    }
}
