//! Behavioral event model
//!
//! Typed, immutable records describing a single behavioral signal as delivered by the
//! platform instrumentation.

use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Metric keys the accumulators understand.
pub mod metric_keys {
    /// Scroll or swipe velocity in pixels per second
    pub const VELOCITY: &str = "velocity";
    /// Scroll or swipe distance in pixels since the previous event of the gesture
    pub const DISTANCE: &str = "distance";
    /// Scroll or swipe direction (`up`, `down`, `left`, `right`)
    pub const DIRECTION: &str = "direction";
    /// Producer-reported direction reversal flag
    pub const DIRECTION_REVERSAL: &str = "direction_reversal";
    /// Typing correction flag
    pub const IS_CORRECTION: &str = "is_correction";
    /// Logical key name for typing events
    pub const KEY: &str = "key";
    /// Action taken on a notification or call
    pub const ACTION: &str = "action";
}

/// Behavioral event types captured from smartphone usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorEventType {
    #[serde(alias = "SCROLL")]
    Scroll,
    #[serde(alias = "TAP")]
    Tap,
    #[serde(alias = "SWIPE")]
    Swipe,
    #[serde(alias = "TYPING")]
    Typing,
    #[serde(alias = "NOTIFICATION")]
    Notification,
    #[serde(alias = "CALL")]
    Call,
    #[serde(alias = "APP_SWITCH")]
    AppSwitch,
    #[serde(alias = "CLIPBOARD")]
    Clipboard,
}

/// Which configuration switch governs an event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalClass {
    /// Touch, scroll, typing and clipboard interaction
    Input,
    /// Interruptions and context switches
    Attention,
}

impl BehaviorEventType {
    /// Every event type, in a stable order.
    pub const ALL: [BehaviorEventType; 8] = [
        BehaviorEventType::Scroll,
        BehaviorEventType::Tap,
        BehaviorEventType::Swipe,
        BehaviorEventType::Typing,
        BehaviorEventType::Notification,
        BehaviorEventType::Call,
        BehaviorEventType::AppSwitch,
        BehaviorEventType::Clipboard,
    ];

    /// Display name used by the front-ends
    pub fn name(self) -> &'static str {
        match self {
            BehaviorEventType::Scroll => "SCROLL",
            BehaviorEventType::Tap => "TAP",
            BehaviorEventType::Swipe => "SWIPE",
            BehaviorEventType::Typing => "TYPING",
            BehaviorEventType::Notification => "NOTIFICATION",
            BehaviorEventType::Call => "CALL",
            BehaviorEventType::AppSwitch => "APP_SWITCH",
            BehaviorEventType::Clipboard => "CLIPBOARD",
        }
    }

    pub fn signal_class(self) -> SignalClass {
        match self {
            BehaviorEventType::Notification
            | BehaviorEventType::Call
            | BehaviorEventType::AppSwitch => SignalClass::Attention,
            _ => SignalClass::Input,
        }
    }

    /// Interruptions end a focus run
    pub fn is_interruption(self) -> bool {
        self.signal_class() == SignalClass::Attention
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BehaviorEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            "left" => Some(ScrollDirection::Left),
            "right" => Some(ScrollDirection::Right),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` reverses the gesture axis
    pub fn is_reversed_by(self, next: ScrollDirection) -> bool {
        matches!(
            (self, next),
            (ScrollDirection::Up, ScrollDirection::Down)
                | (ScrollDirection::Down, ScrollDirection::Up)
                | (ScrollDirection::Left, ScrollDirection::Right)
                | (ScrollDirection::Right, ScrollDirection::Left)
        )
    }
}

/// Interruption action taken by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionAction {
    Ignored,
    Opened,
    Answered,
    Dismissed,
    Missed,
}

impl InterruptionAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ignored" => Some(InterruptionAction::Ignored),
            "opened" => Some(InterruptionAction::Opened),
            "answered" => Some(InterruptionAction::Answered),
            "dismissed" => Some(InterruptionAction::Dismissed),
            "missed" => Some(InterruptionAction::Missed),
            _ => None,
        }
    }

    /// The user never engaged with the interruption
    pub fn is_ignored(self) -> bool {
        matches!(self, InterruptionAction::Ignored | InterruptionAction::Missed)
    }
}

/// A point in time in the engine's clock domain.
///
/// `monotonic_ms` drives every interval computation; `wall_clock` is reported only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTimestamp {
    /// Milliseconds on a monotonic clock shared by the engine and its producers
    pub monotonic_ms: u64,
    /// Wall-clock time of the same instant
    pub wall_clock: DateTime<Utc>,
}

impl EventTimestamp {
    pub fn new(monotonic_ms: u64, wall_clock: DateTime<Utc>) -> Self {
        Self {
            monotonic_ms,
            wall_clock,
        }
    }

    /// Milliseconds elapsed since `earlier`, zero if `earlier` is later
    pub fn millis_since(&self, earlier: &EventTimestamp) -> u64 {
        self.monotonic_ms.saturating_sub(earlier.monotonic_ms)
    }

    /// RFC 3339 rendering of the wall-clock part
    pub fn to_rfc3339(&self) -> String {
        self.wall_clock
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

/// A metric value: numeric or free text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Number(_) => None,
            MetricValue::Text(s) => Some(s.as_str()),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Number(if value { 1.0 } else { 0.0 })
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{:.1}", n),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

struct MetricValueVisitor;

impl<'de> Visitor<'de> for MetricValueVisitor {
    type Value = MetricValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, boolean or string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MetricValue, E> {
        Ok(MetricValue::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MetricValue, E> {
        Ok(MetricValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MetricValue, E> {
        Ok(MetricValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MetricValue, E> {
        Ok(MetricValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MetricValue, E> {
        Ok(MetricValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MetricValue, E> {
        Ok(MetricValue::Text(v))
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MetricValueVisitor)
    }
}

/// Ordered metric mapping; insertion order is preserved for display and serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMetrics(Vec<(String, MetricValue)>);

impl EventMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a metric. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(MetricValue::as_f64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetricValue::as_str)
    }

    /// Numeric flags are true when non-zero
    pub fn flag(&self, key: &str) -> bool {
        self.number(key).is_some_and(|n| n != 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First `n` metrics rendered as `key: value | key: value`
    pub fn display_summary(&self, n: usize) -> String {
        self.0
            .iter()
            .take(n)
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl Serialize for EventMetrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct EventMetricsVisitor;

impl<'de> Visitor<'de> for EventMetricsVisitor {
    type Value = EventMetrics;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of metric names to numbers or strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<EventMetrics, A::Error> {
        let mut metrics = EventMetrics::new();
        while let Some((key, value)) = access.next_entry::<String, MetricValue>()? {
            metrics.insert(key, value);
        }
        Ok(metrics)
    }
}

impl<'de> Deserialize<'de> for EventMetrics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EventMetricsVisitor)
    }
}

/// Why an event was discarded at ingestion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventRejection {
    #[error("metric `{0}` is not a finite number")]
    NonFiniteMetric(String),

    #[error("metric `{0}` must be numeric")]
    NonNumericMetric(String),

    #[error("timestamp {got}ms precedes session start {start}ms")]
    BeforeSessionStart { got: u64, start: u64 },
}

/// A behavioral event with timestamp and type-specific metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    /// Event type
    pub event_type: BehaviorEventType,
    /// Event timestamp
    pub timestamp: EventTimestamp,
    /// Type-specific metrics, in producer order
    #[serde(default)]
    pub metrics: EventMetrics,
}

impl BehaviorEvent {
    pub fn new(event_type: BehaviorEventType, timestamp: EventTimestamp) -> Self {
        Self {
            event_type,
            timestamp,
            metrics: EventMetrics::new(),
        }
    }

    /// Builder-style metric insertion
    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(key, value);
        self
    }

    /// Structural validation, independent of session state
    pub fn validate(&self) -> Result<(), EventRejection> {
        for (key, value) in self.metrics.iter() {
            match value {
                MetricValue::Number(n) if !n.is_finite() => {
                    return Err(EventRejection::NonFiniteMetric(key.to_string()));
                }
                MetricValue::Text(_)
                    if key == metric_keys::VELOCITY || key == metric_keys::DISTANCE =>
                {
                    return Err(EventRejection::NonNumericMetric(key.to_string()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn direction(&self) -> Option<ScrollDirection> {
        self.metrics
            .text(metric_keys::DIRECTION)
            .and_then(ScrollDirection::parse)
    }

    pub fn interruption_action(&self) -> Option<InterruptionAction> {
        self.metrics
            .text(metric_keys::ACTION)
            .and_then(InterruptionAction::parse)
    }

    /// Backspace-style keystroke
    pub fn is_correction(&self) -> bool {
        self.metrics.flag(metric_keys::IS_CORRECTION)
            || self
                .metrics
                .text(metric_keys::KEY)
                .is_some_and(|k| k.eq_ignore_ascii_case("backspace"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: u64) -> EventTimestamp {
        EventTimestamp::new(ms, Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap())
    }

    #[test]
    fn test_behavior_event_type_serialization() {
        let json = serde_json::to_string(&BehaviorEventType::AppSwitch).unwrap();
        assert_eq!(json, "\"app_switch\"");

        let parsed: BehaviorEventType = serde_json::from_str("\"APP_SWITCH\"").unwrap();
        assert_eq!(parsed, BehaviorEventType::AppSwitch);
        assert_eq!(parsed.to_string(), "APP_SWITCH");
    }

    #[test]
    fn test_signal_classes() {
        assert_eq!(BehaviorEventType::Clipboard.signal_class(), SignalClass::Input);
        assert_eq!(BehaviorEventType::Call.signal_class(), SignalClass::Attention);
        assert!(BehaviorEventType::AppSwitch.is_interruption());
        assert!(!BehaviorEventType::Typing.is_interruption());
    }

    #[test]
    fn test_metrics_preserve_insertion_order() {
        let json = r#"{"zeta": 1, "alpha": "down", "mid": true}"#;
        let metrics: EventMetrics = serde_json::from_str(json).unwrap();

        let keys: Vec<&str> = metrics.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(metrics.number("mid"), Some(1.0));
        assert_eq!(
            serde_json::to_string(&metrics).unwrap(),
            r#"{"zeta":1.0,"alpha":"down","mid":1.0}"#
        );
    }

    #[test]
    fn test_metric_replace_keeps_position() {
        let mut metrics = EventMetrics::new();
        metrics.insert("a", 1.0);
        metrics.insert("b", 2.0);
        metrics.insert("a", 3.0);
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.display_summary(2), "a: 3.0 | b: 2.0");
    }

    #[test]
    fn test_behavior_event_deserialization() {
        let json = r#"{
            "event_type": "scroll",
            "timestamp": { "monotonic_ms": 1500, "wall_clock": "2024-01-15T14:05:00Z" },
            "metrics": { "velocity": 150.5, "direction": "down" }
        }"#;

        let event: BehaviorEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, BehaviorEventType::Scroll);
        assert_eq!(event.timestamp.monotonic_ms, 1500);
        assert_eq!(event.metrics.number("velocity"), Some(150.5));
        assert_eq!(event.direction(), Some(ScrollDirection::Down));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let event = BehaviorEvent::new(BehaviorEventType::Scroll, ts(0)).with_metric("velocity", f64::NAN);
        assert_eq!(
            event.validate(),
            Err(EventRejection::NonFiniteMetric("velocity".to_string()))
        );

        let event = BehaviorEvent::new(BehaviorEventType::Scroll, ts(0)).with_metric("velocity", "fast");
        assert!(matches!(
            event.validate(),
            Err(EventRejection::NonNumericMetric(_))
        ));
    }

    #[test]
    fn test_correction_detection() {
        let flagged = BehaviorEvent::new(BehaviorEventType::Typing, ts(0)).with_metric("is_correction", true);
        let backspace = BehaviorEvent::new(BehaviorEventType::Typing, ts(0)).with_metric("key", "Backspace");
        let plain = BehaviorEvent::new(BehaviorEventType::Typing, ts(0)).with_metric("key", "a");

        assert!(flagged.is_correction());
        assert!(backspace.is_correction());
        assert!(!plain.is_correction());
    }

    #[test]
    fn test_direction_reversal() {
        assert!(ScrollDirection::Up.is_reversed_by(ScrollDirection::Down));
        assert!(!ScrollDirection::Up.is_reversed_by(ScrollDirection::Left));
        assert!(InterruptionAction::Missed.is_ignored());
        assert!(!InterruptionAction::Dismissed.is_ignored());
    }
}
