//! Deep focus blocks: uninterrupted interaction runs

use crate::types::{BehaviorEvent, EventTimestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusBlock {
    pub start: EventTimestamp,
    pub end: EventTimestamp,
}

impl FocusBlock {
    fn at(ts: EventTimestamp) -> Self {
        Self { start: ts, end: ts }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end.millis_since(&self.start)
    }
}

/// A run ends at an interruption (notification, call, app switch) or after
/// `break_gap_ms` of silence. Runs lasting `deep_min_ms` or longer are kept.
#[derive(Debug, Clone)]
pub struct FocusAccumulator {
    break_gap_ms: u64,
    deep_min_ms: u64,
    run: Option<FocusBlock>,
    blocks: Vec<FocusBlock>,
}

impl FocusAccumulator {
    pub fn new(break_gap_ms: u64, deep_min_ms: u64) -> Self {
        Self {
            break_gap_ms,
            deep_min_ms,
            run: None,
            blocks: Vec::new(),
        }
    }

    pub fn observe(&mut self, event: &BehaviorEvent) {
        if event.event_type.is_interruption() {
            self.close_run();
            return;
        }

        let ts = event.timestamp;
        match self.run.as_mut() {
            Some(run) if ts.millis_since(&run.end) <= self.break_gap_ms => run.end = ts,
            _ => {
                self.close_run();
                self.run = Some(FocusBlock::at(ts));
            }
        }
    }

    fn close_run(&mut self) {
        if let Some(run) = self.run.take() {
            if run.duration_ms() >= self.deep_min_ms {
                self.blocks.push(run);
            }
        }
    }

    /// Deep focus blocks, including the open run when it already qualifies
    pub fn deep_blocks(&self) -> Vec<FocusBlock> {
        let mut blocks = self.blocks.clone();
        if let Some(run) = self.run {
            if run.duration_ms() >= self.deep_min_ms {
                blocks.push(run);
            }
        }
        blocks
    }
}
