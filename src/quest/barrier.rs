//! Resolve Barriers
//!
//! A resolve barrier holds back a task's status change from its parent
//! objective until a delay has elapsed and/or a named gate is open.

use serde::Deserialize;

use super::status::TaskStatus;

bitflags::bitflags! {
    /// Conditions that must clear before a pending barrier releases.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BarrierConditions: u8 {
        /// Wait for `ResolveBarrier::time_remaining` to reach zero.
        const TIME = 1 << 0;
        /// Wait for `ResolveBarrier::gate` to be open.
        const GATE = 1 << 1;
    }
}

/// Runtime barrier attached to a task after each status change
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolveBarrier {
    /// A parent notification is owed for the last status change
    pub pending: bool,
    pub conditions: BarrierConditions,
    /// Independent countdown for the TIME condition
    pub time_remaining: f32,
    /// Gate name for the GATE condition
    pub gate: String,
}

impl ResolveBarrier {
    /// A pending barrier with no conditions; releases on the first check
    pub fn immediate() -> Self {
        Self {
            pending: true,
            ..Self::default()
        }
    }

    /// A pending barrier that waits `seconds` before releasing
    pub fn after_time(seconds: f32) -> Self {
        Self::immediate().with_time(seconds)
    }

    /// A pending barrier that waits for `gate` to open
    pub fn until_gate(gate: &str) -> Self {
        Self::immediate().with_gate(gate)
    }

    pub fn with_time(mut self, seconds: f32) -> Self {
        self.conditions |= BarrierConditions::TIME;
        self.time_remaining = seconds.max(0.0);
        self
    }

    pub fn with_gate(mut self, gate: &str) -> Self {
        self.conditions |= BarrierConditions::GATE;
        self.gate = gate.to_string();
        self
    }

    /// Whether the barrier is still holding on the given condition
    pub fn is_blocked_on(&self, condition: BarrierConditions) -> bool {
        self.pending && self.conditions.intersects(condition)
    }

    /// Count down the TIME condition, saturating at zero
    pub fn advance(&mut self, delta_time: f32) {
        self.time_remaining = (self.time_remaining - delta_time).max(0.0);
    }

    /// All required conditions are satisfied
    pub fn is_cleared(&self, is_gate_open: impl Fn(&str) -> bool) -> bool {
        if self.is_blocked_on(BarrierConditions::TIME) && self.time_remaining > 0.0 {
            return false;
        }
        if self.is_blocked_on(BarrierConditions::GATE) && !is_gate_open(&self.gate) {
            return false;
        }
        true
    }
}

/// Authored barrier policy, either per task or as the progression default
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BarrierSettings {
    /// Delay in seconds; 0 disables the TIME condition
    pub time: f32,
    /// Gate name; empty disables the GATE condition
    pub gate: String,
    /// Apply when the task completes
    pub on_completed: bool,
    /// Apply when the task fails
    pub on_failed: bool,
}

impl Default for BarrierSettings {
    fn default() -> Self {
        Self {
            time: 0.0,
            gate: String::new(),
            on_completed: true,
            on_failed: true,
        }
    }
}

impl BarrierSettings {
    /// Build the barrier for a transition into `status`
    pub fn barrier_for(&self, status: TaskStatus) -> ResolveBarrier {
        let applies = match status {
            TaskStatus::Completed => self.on_completed,
            TaskStatus::Failed => self.on_failed,
            TaskStatus::NotStarted | TaskStatus::InProgress => false,
        };

        let mut barrier = ResolveBarrier::immediate();
        if applies {
            if self.time > 0.0 {
                barrier = barrier.with_time(self.time);
            }
            if !self.gate.is_empty() {
                barrier = barrier.with_gate(&self.gate);
            }
        }
        barrier
    }

    /// Whether this policy ever holds a notification back
    pub fn is_blocking(&self) -> bool {
        (self.on_completed || self.on_failed) && (self.time > 0.0 || !self.gate.is_empty())
    }
}
