//! Live stats and end-of-session summary types

use crate::context::{DeviceContext, MotionState, SystemState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time projection of the active session's accumulators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorStats {
    /// Mean scroll velocity in px/s
    pub scroll_velocity: Option<f64>,
    pub app_switches_per_minute: f64,
    /// Regularity of inter-event intervals, in [0, 1]
    pub stability_index: Option<f64>,
    /// How broken-up activity is across bursts, in [0, 1]
    pub fragmentation_index: Option<f64>,
}

/// An uninterrupted interaction run of at least the deep-focus length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepFocusBlock {
    pub start_at: String,
    pub end_at: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralMetrics {
    pub interaction_intensity: f64,
    pub task_switch_rate: f64,
    /// Mean time from an app switch to the next interaction
    pub task_switch_cost_ms: u64,
    pub idle_time_ratio: f64,
    pub active_time_ratio: f64,
    pub notification_load: f64,
    pub burstiness: f64,
    pub behavioral_distraction_score: f64,
    pub focus_hint: f64,
    pub fragmented_idle_ratio: f64,
    pub scroll_jitter_rate: f64,
    pub deep_focus_blocks: Vec<DeepFocusBlock>,
    pub scroll_velocity: Option<f64>,
    pub stability_index: Option<f64>,
    pub fragmentation_index: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingSessionSummary {
    pub typing_session_count: u32,
    pub average_keystrokes_per_session: f64,
    pub average_typing_session_duration_sec: f64,
    /// Keystrokes per second
    pub average_typing_speed: f64,
    pub typing_cadence_stability: f64,
    pub burstiness_of_typing: f64,
    pub total_typing_duration_ms: u64,
    pub active_typing_ratio: f64,
    pub deep_typing_blocks: u32,
    pub typing_fragmentation: f64,
    pub correction_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub notification_count: u32,
    pub notification_ignored: u32,
    pub notification_ignore_rate: f64,
    pub notification_clustering_index: f64,
    pub call_count: u32,
    pub call_ignored: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// Equals the event log length at session end
    pub total_events: u32,
    pub app_switch_count: u32,
    /// Accepted events per type display name
    pub events_by_type: BTreeMap<String, u32>,
}

/// Immutable result of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSessionSummary {
    pub session_id: String,
    pub start_at: String,
    pub end_at: String,
    pub duration_ms: u64,
    pub micro_session: bool,
    pub os: String,
    pub app_id: Option<String>,
    pub app_name: Option<String>,
    /// Time since the previous session on the same engine ended
    pub session_spacing_ms: u64,
    pub motion_state: Option<MotionState>,
    pub behavioral_metrics: BehavioralMetrics,
    pub typing_session_summary: Option<TypingSessionSummary>,
    pub notification_summary: NotificationSummary,
    pub system_state: SystemState,
    pub device_context: DeviceContext,
    pub activity_summary: ActivitySummary,
}

impl BehaviorSessionSummary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
