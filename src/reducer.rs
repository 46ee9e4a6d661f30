//! End-of-session reduction
//!
//! Folds the accumulators, the event log and a context snapshot into one immutable
//! [`BehaviorSessionSummary`]. The same inputs always produce the same summary.

use crate::accumulators::SessionAccumulators;
use crate::config::EngineThresholds;
use crate::context::{ContextSnapshot, MotionState};
use crate::error::BehaviorError;
use crate::features;
use crate::summary::{
    ActivitySummary, BehaviorSessionSummary, BehavioralMetrics, DeepFocusBlock,
    NotificationSummary, TypingSessionSummary,
};
use crate::types::{BehaviorEvent, BehaviorEventType, EventTimestamp};

/// Everything the reducer reads; nothing here is mutated
pub struct ReductionInput<'a> {
    pub session_id: &'a str,
    pub accumulators: &'a SessionAccumulators,
    pub events: &'a [BehaviorEvent],
    pub context: &'a ContextSnapshot,
    /// Clock reading when the session was ended
    pub end: EventTimestamp,
    pub previous_session_end: Option<EventTimestamp>,
    pub thresholds: &'a EngineThresholds,
    pub motion_enabled: bool,
}

/// Session end: the later of the clock reading and the latest logged event
pub fn effective_end(requested: EventTimestamp, events: &[BehaviorEvent]) -> EventTimestamp {
    match events.iter().max_by_key(|e| e.timestamp.monotonic_ms) {
        Some(latest) if latest.timestamp.monotonic_ms > requested.monotonic_ms => latest.timestamp,
        _ => requested,
    }
}

pub struct SummaryReducer;

impl SummaryReducer {
    pub fn reduce(input: &ReductionInput<'_>) -> Result<BehaviorSessionSummary, BehaviorError> {
        let host = &input.context.host;
        let os = host
            .os
            .as_deref()
            .filter(|os| !os.trim().is_empty())
            .ok_or_else(|| BehaviorError::IncompleteContext("os".to_string()))?;

        let acc = input.accumulators;
        let start = acc.start();
        let end = effective_end(input.end, input.events);
        let duration_ms = end.millis_since(&start);

        let session_spacing_ms = input
            .previous_session_end
            .map(|previous| start.millis_since(&previous))
            .unwrap_or(0);

        let motion_state = if input.motion_enabled {
            input.context.motion.clone().map(|motion| MotionState {
                major_state_pct: clamp_ratio(motion.major_state_pct),
                ..motion
            })
        } else {
            None
        };

        Ok(BehaviorSessionSummary {
            session_id: input.session_id.to_string(),
            start_at: start.to_rfc3339(),
            end_at: end.to_rfc3339(),
            duration_ms,
            micro_session: duration_ms < input.thresholds.micro_session_max_ms,
            os: os.to_string(),
            app_id: host.app_id.clone(),
            app_name: host.app_name.clone(),
            session_spacing_ms,
            motion_state,
            behavioral_metrics: behavioral_metrics(acc, end, duration_ms),
            typing_session_summary: typing_summary(acc, duration_ms),
            notification_summary: notification_summary(acc),
            system_state: input.context.system_state,
            device_context: input.context.device.clone(),
            activity_summary: ActivitySummary {
                total_events: input.events.len() as u32,
                app_switch_count: acc.interruptions().app_switches(),
                events_by_type: acc.counts_by_type(),
            },
        })
    }
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn behavioral_metrics(
    acc: &SessionAccumulators,
    end: EventTimestamp,
    duration_ms: u64,
) -> BehavioralMetrics {
    let timeline = acc.timeline();
    let interruptions = acc.interruptions();
    let scroll = acc.scroll();
    let partition = timeline.partition(end.monotonic_ms);

    let task_switch_rate =
        features::task_switch_rate(features::per_minute(interruptions.app_switches(), duration_ms));
    let notification_load = features::notification_load(features::per_minute(
        interruptions.notifications(),
        duration_ms,
    ));
    let fragmented_idle_ratio =
        features::fragmented_idle_ratio(partition.idle_segments, duration_ms);
    let scroll_jitter_rate = features::scroll_jitter_rate(scroll.reversals(), scroll.scrolls());
    let distraction = features::distraction_score(
        task_switch_rate,
        notification_load,
        fragmented_idle_ratio,
        scroll_jitter_rate,
    );

    let interruption_events = interruptions.notifications()
        + interruptions.calls()
        + interruptions.app_switches();

    BehavioralMetrics {
        interaction_intensity: features::interaction_intensity(
            acc.total_events(),
            interruption_events,
            acc.typing().totals().total_duration_ms,
            duration_ms,
        ),
        task_switch_rate,
        task_switch_cost_ms: interruptions.task_switch_cost_ms(),
        idle_time_ratio: features::time_ratio(partition.idle_ms, duration_ms),
        active_time_ratio: features::time_ratio(partition.active_ms, duration_ms),
        notification_load,
        burstiness: timeline.burstiness(),
        behavioral_distraction_score: distraction,
        focus_hint: (1.0 - distraction).clamp(0.0, 1.0),
        fragmented_idle_ratio,
        scroll_jitter_rate,
        deep_focus_blocks: acc
            .focus()
            .deep_blocks()
            .into_iter()
            .map(|block| DeepFocusBlock {
                start_at: block.start.to_rfc3339(),
                end_at: block.end.to_rfc3339(),
                duration_ms: block.duration_ms(),
            })
            .collect(),
        scroll_velocity: scroll.mean_velocity(),
        stability_index: timeline.stability_index(),
        fragmentation_index: timeline.fragmentation_index(),
    }
}

/// `None` when the session saw no typing
fn typing_summary(acc: &SessionAccumulators, duration_ms: u64) -> Option<TypingSessionSummary> {
    if acc.count(BehaviorEventType::Typing) == 0 {
        return None;
    }

    let totals = acc.typing().totals();
    let sessions = totals.sessions.max(1) as f64;
    let (cadence_stability, burstiness) = match (totals.cadence.mean(), totals.cadence.std_dev()) {
        (Some(mean), Some(std_dev)) => (
            features::cadence_stability(mean, std_dev),
            features::burstiness(mean, std_dev),
        ),
        _ => (0.0, 0.5),
    };

    Some(TypingSessionSummary {
        typing_session_count: totals.sessions,
        average_keystrokes_per_session: totals.keystrokes as f64 / sessions,
        average_typing_session_duration_sec: totals.total_duration_ms as f64 / sessions / 1000.0,
        average_typing_speed: totals.average_speed,
        typing_cadence_stability: cadence_stability,
        burstiness_of_typing: burstiness,
        total_typing_duration_ms: totals.total_duration_ms,
        active_typing_ratio: features::time_ratio(totals.total_duration_ms, duration_ms),
        deep_typing_blocks: totals.deep_blocks,
        typing_fragmentation: totals.fragmentation(),
        correction_rate: totals.correction_rate(),
    })
}

fn notification_summary(acc: &SessionAccumulators) -> NotificationSummary {
    let interruptions = acc.interruptions();
    NotificationSummary {
        notification_count: interruptions.notifications(),
        notification_ignored: interruptions.notifications_ignored(),
        notification_ignore_rate: interruptions.notification_ignore_rate(),
        notification_clustering_index: interruptions.notification_clustering_index(),
        call_count: interruptions.calls(),
        call_ignored: interruptions.calls_ignored(),
    }
}
