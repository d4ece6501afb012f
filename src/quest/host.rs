//! Progression Host
//!
//! What quest state needs from the root that owns it: barrier policy, gate
//! state and an event sink. Calls are synchronous.

use super::barrier::ResolveBarrier;
use super::definition::TaskDefinition;
use super::events::ProgressionEvent;
use super::status::TaskStatus;

pub trait ProgressionHost {
    /// Barrier to apply after `task` transitions into `status`
    fn barrier_for_task(&self, task: &TaskDefinition, status: TaskStatus) -> ResolveBarrier;

    fn is_gate_open(&self, gate: &str) -> bool;

    fn raise(&mut self, event: ProgressionEvent);
}
