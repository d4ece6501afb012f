//! Quest State Tracking
//!
//! Owns the objective and task tree of one accepted quest, aggregates the
//! quest status and performs all upward propagation of task changes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::barrier::ResolveBarrier;
use super::definition::QuestDefinition;
use super::events::ProgressionEvent;
use super::host::ProgressionHost;
use super::objective::ObjectiveState;
use super::status::{ObjectiveStatus, QuestStatus};
use super::task::TaskState;

#[derive(Debug, Clone)]
pub struct QuestState {
    definition: Arc<QuestDefinition>,
    status: QuestStatus,
    objectives: Vec<ObjectiveState>,
    active_branches: BTreeSet<String>,
    /// task id -> (objective index, task index)
    task_lookup: HashMap<String, (usize, usize)>,
    /// Last terminal status raised as an event; branch changes never clear it
    announced: Option<QuestStatus>,
}

impl QuestState {
    /// Build the state tree for a quest and derive its initial status
    pub fn new(definition: Arc<QuestDefinition>, host: &mut dyn ProgressionHost) -> Self {
        let objectives: Vec<ObjectiveState> = definition
            .objectives
            .iter()
            .map(|objective| {
                ObjectiveState::new(Arc::clone(objective), &definition.id, objective.branch.is_empty())
            })
            .collect();

        let mut state = Self {
            definition,
            status: QuestStatus::NotStarted,
            objectives,
            active_branches: BTreeSet::new(),
            task_lookup: HashMap::new(),
            announced: None,
        };
        state.rebuild_task_lookup();
        state.notify_objective_status_changed(host);
        state
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &QuestDefinition {
        &self.definition
    }

    pub fn status(&self) -> QuestStatus {
        self.status
    }

    pub fn objectives(&self) -> &[ObjectiveState] {
        &self.objectives
    }

    pub fn find_objective(&self, id: &str) -> Option<&ObjectiveState> {
        self.objectives.iter().find(|o| o.id() == id)
    }

    pub fn active_branches(&self) -> impl Iterator<Item = &str> {
        self.active_branches.iter().map(String::as_str)
    }

    /// Unnamed branches are always active
    pub fn is_branch_active(&self, branch: &str) -> bool {
        branch.is_empty() || self.active_branches.contains(branch)
    }

    pub fn find_task(&self, id: &str) -> Option<&TaskState> {
        let &(objective, task) = self.task_lookup.get(id)?;
        Some(&self.objectives[objective].tasks()[task])
    }

    /// Index of the first objective that is neither skipped nor resolved
    pub fn current_objective_index(&self) -> Option<usize> {
        self.objectives
            .iter()
            .position(|o| o.status() != ObjectiveStatus::Skipped && !o.status().is_resolved())
    }

    pub fn current_objective(&self) -> Option<&ObjectiveState> {
        self.current_objective_index().map(|i| &self.objectives[i])
    }

    /// Mutable access to one task; changes propagate through this quest
    pub fn task_mut<'a>(
        &'a mut self,
        id: &str,
        host: &'a mut dyn ProgressionHost,
    ) -> Option<TaskHandle<'a>> {
        let Some(&(objective, task)) = self.task_lookup.get(id) else {
            debug!("Task '{}' not found in quest '{}'", id, self.id());
            return None;
        };
        Some(TaskHandle {
            quest: self,
            host,
            objective,
            task,
        })
    }

    pub fn set_branch_active(&mut self, branch: &str, active: bool, host: &mut dyn ProgressionHost) {
        if branch.is_empty() {
            return;
        }
        let changed = if active {
            self.active_branches.insert(branch.to_string())
        } else {
            self.active_branches.remove(branch)
        };
        if !changed {
            return;
        }

        debug!("Quest '{}' branch '{}' active = {}", self.id(), branch, active);
        for objective in self.objectives.iter_mut().filter(|o| o.branch() == branch) {
            objective.set_branch_active(active, host);
        }
        self.derive_status(true, host);
    }

    /// Re-derive the quest status from its objectives
    pub fn notify_objective_status_changed(&mut self, host: &mut dyn ProgressionHost) {
        self.derive_status(false, host);
    }

    fn derive_status(&mut self, branch_change: bool, host: &mut dyn ProgressionHost) {
        let mut any_failed = false;
        let mut all_completed = true;
        let mut started = false;

        for objective in &self.objectives {
            match objective.status() {
                ObjectiveStatus::Skipped => {}
                ObjectiveStatus::Failed => any_failed = true,
                ObjectiveStatus::Completed => started = true,
                ObjectiveStatus::InProgress => {
                    started = true;
                    all_completed = false;
                }
                ObjectiveStatus::NotStarted => all_completed = false,
            }
        }

        let status = if any_failed {
            QuestStatus::Failed
        } else if all_completed {
            QuestStatus::Completed
        } else if started {
            QuestStatus::InProgress
        } else {
            QuestStatus::NotStarted
        };

        self.change_status(status, branch_change, host);
        self.refresh_visibility();
    }

    /// Advance task timers and barriers in definition order
    pub fn tick(&mut self, delta_time: f32, host: &mut dyn ProgressionHost) {
        for objective in 0..self.objectives.len() {
            for task in 0..self.objectives[objective].tasks().len() {
                if self.objectives[objective].task_mut(task).tick(delta_time, host) {
                    self.notify_task_status_changed(objective, host);
                }
            }
        }
    }

    /// Reset every task; active branches are kept
    pub fn reset(&mut self, host: &mut dyn ProgressionHost) {
        for objective in 0..self.objectives.len() {
            for task in 0..self.objectives[objective].tasks().len() {
                if self.objectives[objective].task_mut(task).reset(host) {
                    self.notify_task_status_changed(objective, host);
                }
            }
        }
    }

    /// Fail every task that has not been resolved yet
    pub fn fail(&mut self, host: &mut dyn ProgressionHost) {
        for objective in 0..self.objectives.len() {
            for task in 0..self.objectives[objective].tasks().len() {
                let state = self.objectives[objective].task_mut(task);
                if !state.status().is_resolved() && state.fail(host) {
                    self.notify_task_status_changed(objective, host);
                }
            }
        }
    }

    pub(crate) fn notify_gate_opened(&mut self, gate: &str, host: &mut dyn ProgressionHost) {
        for objective in 0..self.objectives.len() {
            for task in 0..self.objectives[objective].tasks().len() {
                if self.objectives[objective].task_mut(task).notify_gate_opened(gate, host) {
                    self.notify_task_status_changed(objective, host);
                }
            }
        }
    }

    fn notify_task_status_changed(&mut self, objective: usize, host: &mut dyn ProgressionHost) {
        if self.objectives[objective].notify_task_status_changed(host) {
            self.notify_objective_status_changed(host);
        } else {
            self.refresh_visibility();
        }
    }

    fn refresh_visibility(&mut self) {
        let current = self.current_objective_index();
        for (index, objective) in self.objectives.iter_mut().enumerate() {
            let reachable = objective.status() != ObjectiveStatus::Skipped
                && current.is_none_or(|c| index <= c);
            objective.update_visibility(reachable);
        }
    }

    fn rebuild_task_lookup(&mut self) {
        let mut lookup = HashMap::new();
        for (objective_index, objective) in self.objectives.iter().enumerate() {
            for (task_index, task) in objective.tasks().iter().enumerate() {
                lookup.insert(task.id().to_string(), (objective_index, task_index));
            }
        }
        self.task_lookup = lookup;
    }

    fn change_status(
        &mut self,
        status: QuestStatus,
        branch_change: bool,
        host: &mut dyn ProgressionHost,
    ) {
        if self.status == status {
            return;
        }
        self.status = status;

        if !status.is_resolved() {
            if !branch_change {
                self.announced = None;
            }
            return;
        }
        if self.announced == Some(status) {
            return;
        }
        self.announced = Some(status);

        let quest_id = self.definition.id.clone();
        host.raise(if status == QuestStatus::Completed {
            ProgressionEvent::QuestCompleted { quest_id }
        } else {
            ProgressionEvent::QuestFailed { quest_id }
        });
    }
}

// ============================================================================
// Task Handle
// ============================================================================

/// A task inside a quest, borrowed together with the host so that every
/// change reaches the objective and quest above it.
pub struct TaskHandle<'a> {
    quest: &'a mut QuestState,
    host: &'a mut dyn ProgressionHost,
    objective: usize,
    task: usize,
}

impl TaskHandle<'_> {
    pub fn state(&self) -> &TaskState {
        &self.quest.objectives[self.objective].tasks()[self.task]
    }

    /// Complete the task if sequencing allows it.
    ///
    /// Returns true if the task is now completed; an already completed task
    /// is a no-op success. Rejections leave all state unchanged.
    pub fn complete(&mut self) -> bool {
        let state = self.state();
        if state.is_completed() {
            return true;
        }

        if self.quest.current_objective_index() != Some(self.objective) {
            debug!(
                "Tried to complete task '{}' but objective '{}' is not current, ignoring",
                state.id(),
                state.objective_id()
            );
            return false;
        }

        let objective = &self.quest.objectives[self.objective];
        if objective.is_sequential()
            && state.is_mandatory()
            && objective.next_mandatory_task_index() != Some(self.task)
        {
            debug!("Tried to complete mandatory task '{}' out of order, ignoring", state.id());
            return false;
        }
        if state.is_hidden() {
            debug!("Tried to complete hidden task '{}', ignoring", state.id());
            return false;
        }

        self.apply(|task, host| task.force_complete(host));
        true
    }

    /// Fail the task unconditionally
    pub fn fail(&mut self) {
        self.apply(|task, host| task.fail(host));
    }

    /// Add to progress and return the amount still outstanding.
    ///
    /// Reaching the target completes the task without the sequencing
    /// checks of `complete`. Status is re-derived from the new number, so
    /// progress also moves a failed task out of `Failed`.
    pub fn progress(&mut self, delta: i32) -> i32 {
        let number = self.state().number().saturating_add(delta);
        self.apply(|task, host| task.set_number(number, host));
        self.state().number_outstanding()
    }

    /// Set progress directly, e.g. when restoring saved state
    pub fn set_number(&mut self, number: i32) {
        self.apply(|task, host| task.set_number(number, host));
    }

    pub fn set_time_remaining(&mut self, seconds: f32) {
        self.apply(|task, host| task.set_time_remaining(seconds, host));
    }

    pub fn reset(&mut self) {
        self.apply(|task, host| task.reset(host));
    }

    /// Replace the pending barrier; may release a held notification
    pub fn set_resolve_barrier(&mut self, barrier: ResolveBarrier) {
        self.apply(|task, host| task.set_resolve_barrier(barrier, host));
    }

    /// Run one task mutation and propagate it if the barrier allows
    fn apply(&mut self, op: impl FnOnce(&mut TaskState, &mut dyn ProgressionHost) -> bool) {
        let task = self.quest.objectives[self.objective].task_mut(self.task);
        if op(task, &mut *self.host) {
            self.quest.notify_task_status_changed(self.objective, &mut *self.host);
        }
    }
}
