//! Engine configuration
//!
//! Configuration is fixed for the lifetime of a [`crate::BehaviorEngine`]. Every timing
//! constant the accumulators use lives in [`EngineThresholds`] rather than in code.

use crate::error::BehaviorError;
use crate::types::{BehaviorEventType, SignalClass};
use serde::{Deserialize, Serialize};

/// Default gap separating bursts and scroll gestures (300 ms)
pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 300;

/// Default pause that closes a typing session (2 s)
pub const DEFAULT_TYPING_GAP_MS: u64 = 2_000;

/// Default minimum length of a deep typing block (1 minute)
pub const DEFAULT_DEEP_TYPING_MIN_MS: u64 = 60_000;

/// Default silence that breaks a focus run (30 s)
pub const DEFAULT_FOCUS_BREAK_GAP_MS: u64 = 30_000;

/// Default minimum length of a deep focus block (2 minutes)
pub const DEFAULT_DEEP_FOCUS_MIN_MS: u64 = 120_000;

/// Sessions shorter than this are flagged as micro sessions (30 s)
pub const DEFAULT_MICRO_SESSION_MAX_MS: u64 = 30_000;

/// Number of recent events kept for live display
pub const DEFAULT_RECENT_WINDOW: usize = 20;

/// Per-subscriber buffer before the oldest undelivered events are dropped
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Segmentation thresholds used by the metric accumulators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineThresholds {
    /// Inter-event gap above which a new burst (and scroll gesture) starts
    pub idle_threshold_ms: u64,
    /// Inter-keystroke gap above which a new typing session starts
    pub typing_gap_ms: u64,
    /// Typing sessions at least this long count as deep typing blocks
    pub deep_typing_min_ms: u64,
    /// Silence that ends a focus run
    pub focus_break_gap_ms: u64,
    /// Focus runs at least this long count as deep focus blocks
    pub deep_focus_min_ms: u64,
    /// Sessions shorter than this are micro sessions
    pub micro_session_max_ms: u64,
}

impl Default for EngineThresholds {
    fn default() -> Self {
        Self {
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            typing_gap_ms: DEFAULT_TYPING_GAP_MS,
            deep_typing_min_ms: DEFAULT_DEEP_TYPING_MIN_MS,
            focus_break_gap_ms: DEFAULT_FOCUS_BREAK_GAP_MS,
            deep_focus_min_ms: DEFAULT_DEEP_FOCUS_MIN_MS,
            micro_session_max_ms: DEFAULT_MICRO_SESSION_MAX_MS,
        }
    }
}

/// Behavior engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Accept touch, scroll, swipe, typing and clipboard events
    #[serde(default = "default_true")]
    pub enable_input_signals: bool,
    /// Accept notification, call and app switch events
    #[serde(default = "default_true")]
    pub enable_attention_signals: bool,
    /// Accept motion classifications into the session summary
    #[serde(default)]
    pub enable_motion_lite: bool,
    /// Segmentation thresholds
    #[serde(default)]
    pub thresholds: EngineThresholds,
    /// Capacity of the recent-events window
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    /// Buffered events per live subscriber
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_recent_window() -> usize {
    DEFAULT_RECENT_WINDOW
}

fn default_subscriber_capacity() -> usize {
    DEFAULT_SUBSCRIBER_CAPACITY
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            enable_input_signals: true,
            enable_attention_signals: true,
            enable_motion_lite: false,
            thresholds: EngineThresholds::default(),
            recent_window: DEFAULT_RECENT_WINDOW,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl BehaviorConfig {
    /// Configuration with the three front-end switches and default thresholds
    pub fn new(
        enable_input_signals: bool,
        enable_attention_signals: bool,
        enable_motion_lite: bool,
    ) -> Self {
        Self {
            enable_input_signals,
            enable_attention_signals,
            enable_motion_lite,
            ..Self::default()
        }
    }

    /// Parse configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, BehaviorError> {
        let config: BehaviorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, BehaviorError> {
        serde_json::to_string_pretty(self).map_err(|e| BehaviorError::EncodingError(e.to_string()))
    }

    /// Reject invalid or contradictory options
    pub fn validate(&self) -> Result<(), BehaviorError> {
        if !self.enable_input_signals && !self.enable_attention_signals {
            return Err(BehaviorError::Configuration(
                "at least one of input or attention signals must be enabled".to_string(),
            ));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("idle_threshold_ms", t.idle_threshold_ms),
            ("typing_gap_ms", t.typing_gap_ms),
            ("deep_typing_min_ms", t.deep_typing_min_ms),
            ("focus_break_gap_ms", t.focus_break_gap_ms),
            ("deep_focus_min_ms", t.deep_focus_min_ms),
        ] {
            if value == 0 {
                return Err(BehaviorError::Configuration(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        if self.subscriber_capacity == 0 {
            return Err(BehaviorError::Configuration(
                "subscriber_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether events of this type are accepted under this configuration
    pub fn accepts(&self, event_type: BehaviorEventType) -> bool {
        match event_type.signal_class() {
            SignalClass::Input => self.enable_input_signals,
            SignalClass::Attention => self.enable_attention_signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BehaviorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.idle_threshold_ms, 300);
        assert!(!config.enable_motion_lite);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = BehaviorConfig::from_json(
            r#"{ "enable_motion_lite": true, "thresholds": { "idle_threshold_ms": 500 } }"#,
        )
        .unwrap();

        assert!(config.enable_input_signals);
        assert!(config.enable_motion_lite);
        assert_eq!(config.thresholds.idle_threshold_ms, 500);
        assert_eq!(config.thresholds.typing_gap_ms, DEFAULT_TYPING_GAP_MS);
        assert_eq!(config.recent_window, DEFAULT_RECENT_WINDOW);
    }

    #[test]
    fn test_all_signals_disabled_is_contradictory() {
        let config = BehaviorConfig::new(false, false, true);
        assert!(matches!(
            config.validate(),
            Err(BehaviorError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = BehaviorConfig::default();
        config.thresholds.idle_threshold_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("idle_threshold_ms"));

        let mut config = BehaviorConfig::default();
        config.subscriber_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accepts_by_signal_class() {
        let config = BehaviorConfig::new(true, false, false);
        assert!(config.accepts(BehaviorEventType::Tap));
        assert!(config.accepts(BehaviorEventType::Clipboard));
        assert!(!config.accepts(BehaviorEventType::Notification));
        assert!(!config.accepts(BehaviorEventType::AppSwitch));
    }
}
