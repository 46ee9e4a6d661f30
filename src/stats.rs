//! Live statistics projection

use crate::accumulators::SessionAccumulators;
use crate::features;
use crate::summary::BehaviorStats;

/// Shortest window live rates are taken over
pub const MIN_RATE_WINDOW_MS: u64 = 1_000;

/// Projects live stats from borrowed accumulators without mutating them
pub struct StatsProjector;

impl StatsProjector {
    /// Rates are taken over session start to the last accepted event, so repeated reads with
    /// no ingestion in between return identical values. The window is never shorter than
    /// `MIN_RATE_WINDOW_MS`.
    pub fn project(accumulators: &SessionAccumulators) -> BehaviorStats {
        let timeline = accumulators.timeline();
        BehaviorStats {
            scroll_velocity: accumulators.scroll().mean_velocity(),
            app_switches_per_minute: features::per_minute(
                accumulators.interruptions().app_switches(),
                accumulators.elapsed_to_last_event_ms().max(MIN_RATE_WINDOW_MS),
            ),
            stability_index: timeline.stability_index(),
            fragmentation_index: timeline.fragmentation_index(),
        }
    }

    /// Stats while no session is active
    pub fn idle() -> BehaviorStats {
        BehaviorStats::default()
    }
}
