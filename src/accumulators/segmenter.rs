//! Threshold-based gap segmentation
//!
//! Shared by burst detection, scroll gestures, typing sessions and focus runs: a new
//! segment starts whenever the gap since the previous observation exceeds the threshold.

use serde::Serialize;

/// A maximal run of observations with every gap at or below the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub events: u32,
}

impl Segment {
    fn open(at_ms: u64) -> Self {
        Self {
            start_ms: at_ms,
            end_ms: at_ms,
            events: 1,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Outcome of observing one timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// First observation; opened the first segment
    First,
    /// Gap within threshold; current segment extended
    Continue { gap_ms: u64 },
    /// Gap above threshold; `closed` ended and a new segment opened
    Break { gap_ms: u64, closed: Segment },
}

#[derive(Debug, Clone)]
pub struct GapSegmenter {
    threshold_ms: u64,
    current: Option<Segment>,
    segments: u32,
}

impl GapSegmenter {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            current: None,
            segments: 0,
        }
    }

    /// Observe a timestamp. Callers guarantee non-decreasing input.
    pub fn observe(&mut self, at_ms: u64) -> Step {
        match self.current.as_mut() {
            None => {
                self.current = Some(Segment::open(at_ms));
                self.segments += 1;
                Step::First
            }
            Some(seg) => {
                let gap_ms = at_ms.saturating_sub(seg.end_ms);
                if gap_ms > self.threshold_ms {
                    let closed = *seg;
                    *seg = Segment::open(at_ms);
                    self.segments += 1;
                    Step::Break { gap_ms, closed }
                } else {
                    seg.end_ms = at_ms;
                    seg.events += 1;
                    Step::Continue { gap_ms }
                }
            }
        }
    }

    /// Close the open segment without starting another
    pub fn close(&mut self) -> Option<Segment> {
        self.current.take()
    }

    /// The open segment, if any
    pub fn current(&self) -> Option<Segment> {
        self.current
    }

    /// Segments opened so far, including the open one
    pub fn segments(&self) -> u32 {
        self.segments
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_gap_above_threshold() {
        let mut seg = GapSegmenter::new(300);
        assert_eq!(seg.observe(0), Step::First);
        assert_eq!(seg.observe(100), Step::Continue { gap_ms: 100 });
        assert_eq!(seg.observe(150), Step::Continue { gap_ms: 50 });

        match seg.observe(600) {
            Step::Break { gap_ms, closed } => {
                assert_eq!(gap_ms, 450);
                assert_eq!(closed, Segment { start_ms: 0, end_ms: 150, events: 3 });
            }
            other => panic!("expected break, got {:?}", other),
        }

        assert_eq!(seg.observe(650), Step::Continue { gap_ms: 50 });
        assert_eq!(seg.segments(), 2);
        assert_eq!(seg.current().unwrap().events, 2);
    }

    #[test]
    fn test_gap_equal_to_threshold_continues() {
        let mut seg = GapSegmenter::new(300);
        seg.observe(0);
        assert_eq!(seg.observe(300), Step::Continue { gap_ms: 300 });
        assert_eq!(seg.segments(), 1);
    }

    #[test]
    fn test_close_counts_segment_but_clears_current() {
        let mut seg = GapSegmenter::new(300);
        seg.observe(10);
        let closed = seg.close().unwrap();
        assert_eq!(closed.duration_ms(), 0);
        assert!(seg.current().is_none());
        assert_eq!(seg.observe(20), Step::First);
        assert_eq!(seg.segments(), 2);
    }
}
