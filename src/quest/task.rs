//! Task State
//!
//! Runtime state for one task. Every status change goes through
//! `change_status`, which raises events and arms the resolve barrier.
//!
//! Mutators return `true` when the parent objective must be notified now;
//! `QuestState` performs that propagation.

use std::sync::Arc;

use tracing::debug;

use super::barrier::{BarrierConditions, ResolveBarrier};
use super::definition::TaskDefinition;
use super::events::{ProgressionEvent, TaskSnapshot};
use super::host::ProgressionHost;
use super::status::TaskStatus;

#[derive(Debug, Clone)]
pub struct TaskState {
    definition: Arc<TaskDefinition>,
    // Parent identifiers, resolved through the owning QuestState
    quest_id: String,
    objective_id: String,
    number: i32,
    time_remaining: f32,
    status: TaskStatus,
    /// Last status delivered to the parent objective
    reported_status: TaskStatus,
    hidden: bool,
    barrier: ResolveBarrier,
}

impl TaskState {
    pub(crate) fn new(definition: Arc<TaskDefinition>, quest_id: &str, objective_id: &str) -> Self {
        let time_remaining = definition.time_limit;
        Self {
            definition,
            quest_id: quest_id.to_string(),
            objective_id: objective_id.to_string(),
            number: 0,
            time_remaining,
            status: TaskStatus::NotStarted,
            reported_status: TaskStatus::NotStarted,
            hidden: false,
            barrier: ResolveBarrier::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    pub fn quest_id(&self) -> &str {
        &self.quest_id
    }

    pub fn objective_id(&self) -> &str {
        &self.objective_id
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    /// Unvalidated definitions may carry a target below 1; treat it as 1
    pub fn target_number(&self) -> i32 {
        self.definition.target_number.max(1)
    }

    /// Amount still needed to reach the target
    pub fn number_outstanding(&self) -> i32 {
        self.target_number() - self.number
    }

    pub fn time_remaining(&self) -> f32 {
        self.time_remaining
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Status as currently seen by the parent objective
    pub fn reported_status(&self) -> TaskStatus {
        self.reported_status
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_mandatory(&self) -> bool {
        self.definition.mandatory
    }

    pub fn is_time_limited(&self) -> bool {
        self.definition.is_time_limited()
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn resolve_barrier(&self) -> &ResolveBarrier {
        &self.barrier
    }

    /// A parent notification is still held back by the barrier
    pub fn is_resolve_pending(&self) -> bool {
        self.barrier.pending
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            quest_id: self.quest_id.clone(),
            objective_id: self.objective_id.clone(),
            task_id: self.definition.id.clone(),
            status: self.status,
            number: self.number,
            target_number: self.target_number(),
            time_remaining: self.time_remaining,
            hidden: self.hidden,
        }
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Snap to target and complete, without sequencing checks
    pub(crate) fn force_complete(&mut self, host: &mut dyn ProgressionHost) -> bool {
        self.number = self.target_number();
        self.change_status(TaskStatus::Completed, host)
    }

    pub(crate) fn fail(&mut self, host: &mut dyn ProgressionHost) -> bool {
        self.change_status(TaskStatus::Failed, host)
    }

    /// Set progress directly, clamped to `[0, target]`
    pub(crate) fn set_number(&mut self, number: i32, host: &mut dyn ProgressionHost) -> bool {
        let target = self.target_number();
        self.number = number.clamp(0, target);
        host.raise(ProgressionEvent::TaskUpdated(self.snapshot()));

        let status = if self.number == target {
            TaskStatus::Completed
        } else if self.number > 0 {
            TaskStatus::InProgress
        } else {
            TaskStatus::NotStarted
        };
        self.change_status(status, host)
    }

    /// Set remaining time, clamped to zero; running out fails an incomplete task
    pub(crate) fn set_time_remaining(&mut self, seconds: f32, host: &mut dyn ProgressionHost) -> bool {
        // May exceed the definition's limit
        self.time_remaining = seconds.max(0.0);

        if !self.is_time_limited() {
            return false;
        }

        host.raise(ProgressionEvent::TaskUpdated(self.snapshot()));
        if self.time_remaining <= 0.0 && self.status != TaskStatus::Completed {
            self.time_remaining = 0.0;
            debug!("Task '{}' in quest '{}' ran out of time", self.id(), self.quest_id);
            return self.fail(host);
        }
        false
    }

    pub(crate) fn reset(&mut self, host: &mut dyn ProgressionHost) -> bool {
        self.number = 0;
        self.time_remaining = self.definition.time_limit;
        self.change_status(TaskStatus::NotStarted, host)
    }

    pub(crate) fn tick(&mut self, delta_time: f32, host: &mut dyn ProgressionHost) -> bool {
        let mut notify = false;

        // No countdown while hidden or already resolved
        if !self.hidden
            && !self.status.is_resolved()
            && self.is_time_limited()
            && self.time_remaining > 0.0
        {
            notify |= self.set_time_remaining(self.time_remaining - delta_time, host);
        }

        // Barrier time runs on its own schedule, even after resolution
        if self.barrier.is_blocked_on(BarrierConditions::TIME) {
            self.barrier.advance(delta_time);
            notify |= self.try_release(host);
        }

        notify
    }

    pub(crate) fn set_resolve_barrier(
        &mut self,
        barrier: ResolveBarrier,
        host: &mut dyn ProgressionHost,
    ) -> bool {
        self.barrier = barrier;
        self.try_release(host)
    }

    pub(crate) fn notify_gate_opened(&mut self, gate: &str, host: &mut dyn ProgressionHost) -> bool {
        if self.barrier.is_blocked_on(BarrierConditions::GATE) && self.barrier.gate == gate {
            return self.try_release(host);
        }
        false
    }

    fn change_status(&mut self, status: TaskStatus, host: &mut dyn ProgressionHost) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;

        let snapshot = self.snapshot();
        host.raise(ProgressionEvent::TaskUpdated(snapshot.clone()));
        match status {
            TaskStatus::Completed => host.raise(ProgressionEvent::TaskCompleted(snapshot)),
            TaskStatus::Failed => host.raise(ProgressionEvent::TaskFailed(snapshot)),
            TaskStatus::NotStarted | TaskStatus::InProgress => {}
        }

        self.barrier = host.barrier_for_task(&self.definition, status);
        self.try_release(host)
    }

    /// Release the pending notification if every condition is met.
    /// Returns true at most once per armed barrier.
    fn try_release(&mut self, host: &dyn ProgressionHost) -> bool {
        if !self.barrier.pending {
            return false;
        }
        if !self.barrier.is_cleared(|gate| host.is_gate_open(gate)) {
            return false;
        }
        self.barrier.pending = false;
        self.reported_status = self.status;
        true
    }
}
