//! External context merged into session summaries
//!
//! Device and system state are sampled by the host off the event path and pushed here.
//! The reducer only ever sees an immutable [`ContextSnapshot`].

use crate::accumulators::Welford;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host application identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Operating system name and version; required to reduce a session
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
}

impl HostInfo {
    pub fn new(os: impl Into<String>) -> Self {
        Self {
            os: Some(os.into()),
            app_id: None,
            app_name: None,
        }
    }
}

/// System toggles at summary time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    pub internet_state: bool,
    pub do_not_disturb: bool,
    pub charging: bool,
}

/// Screen orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => f.write_str("portrait"),
            Orientation::Landscape => f.write_str("landscape"),
        }
    }
}

/// One device-context reading from the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSample {
    /// Screen brightness in [0, 1]
    #[serde(default)]
    pub screen_brightness: Option<f64>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
}

/// Device context group of the session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceContext {
    /// Mean screen brightness in [0, 1]; 0 when never sampled
    pub avg_screen_brightness: f64,
    /// First orientation seen, `unknown` when never sampled
    pub start_orientation: String,
    pub orientation_changes: u32,
}

/// Motion classification produced by the external motion model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub major_state: String,
    /// Share of the session spent in `major_state`, in [0, 1]
    pub major_state_pct: f64,
    pub ml_model: String,
    #[serde(default)]
    pub state: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct DeviceContextAccumulator {
    brightness: Welford,
    start_orientation: Option<Orientation>,
    last_orientation: Option<Orientation>,
    orientation_changes: u32,
}

impl DeviceContextAccumulator {
    fn record(&mut self, sample: DeviceSample) {
        if let Some(b) = sample.screen_brightness.filter(|b| b.is_finite()) {
            self.brightness.push(b.clamp(0.0, 1.0));
        }

        if let Some(orientation) = sample.orientation {
            if self.start_orientation.is_none() {
                self.start_orientation = Some(orientation);
            }
            if self.last_orientation.is_some_and(|last| last != orientation) {
                self.orientation_changes += 1;
            }
            self.last_orientation = Some(orientation);
        }
    }

    fn summary(&self) -> DeviceContext {
        DeviceContext {
            avg_screen_brightness: self.brightness.mean().unwrap_or(0.0),
            start_orientation: self
                .start_orientation
                .map(|o| o.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            orientation_changes: self.orientation_changes,
        }
    }
}

/// Immutable context handed to the summary reducer
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    pub host: HostInfo,
    pub system_state: SystemState,
    pub device: DeviceContext,
    pub motion: Option<MotionState>,
}

/// Mutable context owned by the engine, separate from the event path.
///
/// Host info and system state persist across sessions; device samples and the motion
/// classification are per session.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    host: HostInfo,
    system_state: SystemState,
    device: DeviceContextAccumulator,
    motion: Option<MotionState>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_host_info(&mut self, host: HostInfo) {
        self.host = host;
    }

    pub fn set_system_state(&mut self, state: SystemState) {
        self.system_state = state;
    }

    pub fn record_device_sample(&mut self, sample: DeviceSample) {
        self.device.record(sample);
    }

    pub fn set_motion_state(&mut self, motion: MotionState) {
        self.motion = Some(motion);
    }

    /// Clear per-session context at session start
    pub fn reset_session(&mut self) {
        self.device = DeviceContextAccumulator::default();
        self.motion = None;
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            host: self.host.clone(),
            system_state: self.system_state,
            device: self.device.summary(),
            motion: self.motion.clone(),
        }
    }
}
