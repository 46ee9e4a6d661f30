//! Scroll gestures, velocity and direction reversals

use super::segmenter::{GapSegmenter, Step};
use super::welford::Welford;
use crate::types::{metric_keys, BehaviorEvent, ScrollDirection};

#[derive(Debug, Clone)]
pub struct ScrollAccumulator {
    gestures: GapSegmenter,
    velocity: Welford,
    scrolls: u32,
    reversals: u32,
    last_direction: Option<ScrollDirection>,
}

impl ScrollAccumulator {
    pub fn new(gesture_gap_ms: u64) -> Self {
        Self {
            gestures: GapSegmenter::new(gesture_gap_ms),
            velocity: Welford::new(),
            scrolls: 0,
            reversals: 0,
            last_direction: None,
        }
    }

    pub fn observe(&mut self, event: &BehaviorEvent) {
        self.scrolls += 1;
        let step = self.gestures.observe(event.timestamp.monotonic_ms);

        // Explicit velocity wins; otherwise distance over the gap within one gesture
        let velocity = event
            .metrics
            .number(metric_keys::VELOCITY)
            .map(f64::abs)
            .or_else(|| match step {
                Step::Continue { gap_ms } if gap_ms > 0 => event
                    .metrics
                    .number(metric_keys::DISTANCE)
                    .map(|d| d.abs() * 1000.0 / gap_ms as f64),
                _ => None,
            });
        if let Some(v) = velocity {
            self.velocity.push(v);
        }

        let direction = event.direction();
        let reversed = match event.metrics.get(metric_keys::DIRECTION_REVERSAL) {
            Some(_) => event.metrics.flag(metric_keys::DIRECTION_REVERSAL),
            None => matches!(
                (self.last_direction, direction),
                (Some(prev), Some(next)) if prev.is_reversed_by(next)
            ),
        };
        if reversed {
            self.reversals += 1;
        }
        if direction.is_some() {
            self.last_direction = direction;
        }
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls
    }

    pub fn gestures(&self) -> u32 {
        self.gestures.segments()
    }

    pub fn reversals(&self) -> u32 {
        self.reversals
    }

    /// Mean velocity in px/s; `None` until a velocity sample exists
    pub fn mean_velocity(&self) -> Option<f64> {
        self.velocity.mean()
    }
}
