//! Synheart Behavior - On-device behavioral session engine
//!
//! Behavior turns a stream of smartphone interaction events (scrolls, taps, swipes,
//! keystrokes, notifications, calls, app switches, clipboard actions) into session-level
//! signals: live rolling stats while a session is open and a deterministic, fully reduced
//! summary when it ends.
//!
//! ## Modules
//!
//! - **Engine**: thread-safe session lifecycle, ingestion and live subscription
//! - **Accumulators**: constant-time streaming metrics updated per event
//! - **Reducer**: end-of-session summary built from accumulators and context

pub mod accumulators;
pub mod capability;
pub mod clock;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod features;
pub mod reducer;
pub mod session;
pub mod stats;
pub mod subscription;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use capability::{Capability, CapabilityReport};
pub use clock::{Clock, ManualClock, SequentialSessionIds, SessionIdGenerator, SystemClock, UuidSessionIds};
pub use config::{BehaviorConfig, EngineThresholds};
pub use context::{DeviceContext, DeviceSample, HostInfo, MotionState, Orientation, SystemState};
pub use engine::{BehaviorEngine, EngineDiagnostics};
pub use error::BehaviorError;
pub use session::SessionHandle;
pub use subscription::EventSubscription;
pub use summary::{BehaviorSessionSummary, BehaviorStats};
pub use types::{
    metric_keys, BehaviorEvent, BehaviorEventType, EventMetrics, EventTimestamp, MetricValue,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "synheart-behavior";
