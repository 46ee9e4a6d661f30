//! Notifications, calls and app switches

use super::welford::Welford;
use crate::features;
use crate::types::{BehaviorEvent, BehaviorEventType};

#[derive(Debug, Clone, Default)]
pub struct InterruptionAccumulator {
    notifications: u32,
    notifications_ignored: u32,
    calls: u32,
    calls_ignored: u32,
    last_notification_ms: Option<u64>,
    notification_gaps: Welford,
    app_switches: u32,
    pending_switch_ms: Option<u64>,
    switch_cost: Welford,
}

impl InterruptionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &BehaviorEvent) {
        let at_ms = event.timestamp.monotonic_ms;
        let ignored = event
            .interruption_action()
            .is_some_and(|action| action.is_ignored());

        match event.event_type {
            BehaviorEventType::Notification => {
                self.notifications += 1;
                if ignored {
                    self.notifications_ignored += 1;
                }
                if let Some(last) = self.last_notification_ms {
                    self.notification_gaps.push(at_ms.saturating_sub(last) as f64);
                }
                self.last_notification_ms = Some(at_ms);
            }
            BehaviorEventType::Call => {
                self.calls += 1;
                if ignored {
                    self.calls_ignored += 1;
                }
            }
            BehaviorEventType::AppSwitch => {
                self.app_switches += 1;
                self.pending_switch_ms = Some(at_ms);
            }
            _ => {
                // Resumption latency after a switch
                if let Some(switched_at) = self.pending_switch_ms.take() {
                    self.switch_cost.push(at_ms.saturating_sub(switched_at) as f64);
                }
            }
        }
    }

    pub fn notifications(&self) -> u32 {
        self.notifications
    }

    pub fn notifications_ignored(&self) -> u32 {
        self.notifications_ignored
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn calls_ignored(&self) -> u32 {
        self.calls_ignored
    }

    pub fn app_switches(&self) -> u32 {
        self.app_switches
    }

    pub fn notification_ignore_rate(&self) -> f64 {
        if self.notifications == 0 {
            return 0.0;
        }
        self.notifications_ignored as f64 / self.notifications as f64
    }

    /// 0.0 until three notifications give two inter-arrival gaps
    pub fn notification_clustering_index(&self) -> f64 {
        self.notification_gaps
            .moments(2)
            .map(|(mean, variance)| features::clustering_index(mean, variance))
            .unwrap_or(0.0)
    }

    /// Mean ms from an app switch to the next interaction, rounded
    pub fn task_switch_cost_ms(&self) -> u64 {
        self.switch_cost
            .mean()
            .map(|mean| mean.round() as u64)
            .unwrap_or(0)
    }
}
