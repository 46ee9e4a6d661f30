//! Optional signal source availability
//!
//! The host reports what the platform granted; the gate only answers queries and never
//! prompts or blocks ingestion.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Notification listener access
    NotificationListener,
    /// Phone call state access
    CallState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub notification_listener: bool,
    pub call_state: bool,
}

#[derive(Debug)]
pub struct CapabilityGate {
    attention_enabled: bool,
    notification_listener: AtomicBool,
    call_state: AtomicBool,
}

impl CapabilityGate {
    /// Both capabilities depend on attention signals being enabled
    pub fn new(attention_enabled: bool) -> Self {
        Self {
            attention_enabled,
            notification_listener: AtomicBool::new(false),
            call_state: AtomicBool::new(false),
        }
    }

    fn flag(&self, capability: Capability) -> &AtomicBool {
        match capability {
            Capability::NotificationListener => &self.notification_listener,
            Capability::CallState => &self.call_state,
        }
    }

    pub fn report(&self, capability: Capability, granted: bool) {
        self.flag(capability).store(granted, Ordering::Release);
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        self.attention_enabled && self.flag(capability).load(Ordering::Acquire)
    }

    pub fn report_all(&self) -> CapabilityReport {
        CapabilityReport {
            notification_listener: self.is_available(Capability::NotificationListener),
            call_state: self.is_available(Capability::CallState),
        }
    }
}
