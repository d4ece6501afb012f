//! Objective State
//!
//! Aggregates task statuses into an objective status and tracks which
//! tasks of a sequential objective are reachable.

use std::sync::Arc;

use super::definition::ObjectiveDefinition;
use super::events::ProgressionEvent;
use super::host::ProgressionHost;
use super::status::{ObjectiveStatus, TaskStatus};
use super::task::TaskState;

#[derive(Debug, Clone)]
pub struct ObjectiveState {
    definition: Arc<ObjectiveDefinition>,
    quest_id: String,
    status: ObjectiveStatus,
    tasks: Vec<TaskState>,
    mandatory_tasks_needed: usize,
    branch_active: bool,
    /// Last terminal status raised as an event; survives a round trip through `Skipped`
    announced: Option<ObjectiveStatus>,
}

impl ObjectiveState {
    pub(crate) fn new(definition: Arc<ObjectiveDefinition>, quest_id: &str, branch_active: bool) -> Self {
        let tasks = definition
            .tasks
            .iter()
            .map(|task| TaskState::new(Arc::clone(task), quest_id, &definition.id))
            .collect();
        let mandatory_tasks_needed = definition.mandatory_tasks_needed();

        Self {
            definition,
            quest_id: quest_id.to_string(),
            status: if branch_active {
                ObjectiveStatus::NotStarted
            } else {
                ObjectiveStatus::Skipped
            },
            tasks,
            mandatory_tasks_needed,
            branch_active,
            announced: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &ObjectiveDefinition {
        &self.definition
    }

    pub fn status(&self) -> ObjectiveStatus {
        self.status
    }

    pub fn tasks(&self) -> &[TaskState] {
        &self.tasks
    }

    pub fn is_sequential(&self) -> bool {
        self.definition.sequential
    }

    pub fn branch(&self) -> &str {
        &self.definition.branch
    }

    pub fn is_branch_active(&self) -> bool {
        self.branch_active
    }

    pub fn mandatory_tasks_needed(&self) -> usize {
        self.mandatory_tasks_needed
    }

    /// First mandatory task, in order, that is not completed.
    /// Only meaningful for sequential objectives.
    pub fn next_mandatory_task_index(&self) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t.is_mandatory() && !t.is_completed())
    }

    pub fn next_mandatory_task(&self) -> Option<&TaskState> {
        self.next_mandatory_task_index().map(|i| &self.tasks[i])
    }

    pub(crate) fn task_mut(&mut self, index: usize) -> &mut TaskState {
        &mut self.tasks[index]
    }

    /// Re-derive status from the tasks' reported statuses.
    /// Returns true if the status changed.
    pub(crate) fn notify_task_status_changed(&mut self, host: &mut dyn ProgressionHost) -> bool {
        if !self.branch_active {
            return self.change_status(ObjectiveStatus::Skipped, host);
        }

        let mut mandatory_total = 0;
        let mut completed = 0;
        let mut failed = 0;
        let mut started = false;

        for task in &self.tasks {
            let status = task.reported_status();
            if status != TaskStatus::NotStarted {
                started = true;
            }
            if task.is_mandatory() {
                mandatory_total += 1;
                match status {
                    TaskStatus::Completed => completed += 1,
                    TaskStatus::Failed => failed += 1,
                    TaskStatus::NotStarted | TaskStatus::InProgress => {}
                }
            }
        }

        // Failed once too few mandatory tasks remain to reach the requirement
        let status = if failed > mandatory_total - self.mandatory_tasks_needed.min(mandatory_total) {
            ObjectiveStatus::Failed
        } else if completed >= self.mandatory_tasks_needed {
            ObjectiveStatus::Completed
        } else if started {
            ObjectiveStatus::InProgress
        } else {
            ObjectiveStatus::NotStarted
        };

        self.change_status(status, host)
    }

    /// Enter or leave `Skipped`. Returns true if the status changed.
    pub(crate) fn set_branch_active(&mut self, active: bool, host: &mut dyn ProgressionHost) -> bool {
        self.branch_active = active;
        self.notify_task_status_changed(host)
    }

    /// Hide tasks that cannot be worked on yet
    pub(crate) fn update_visibility(&mut self, reachable: bool) {
        let frontier = if self.is_sequential() {
            self.tasks
                .iter()
                .position(|t| t.is_mandatory() && t.reported_status() != TaskStatus::Completed)
        } else {
            None
        };

        for (index, task) in self.tasks.iter_mut().enumerate() {
            let beyond_frontier = frontier.is_some_and(|f| index > f);
            task.set_hidden(!reachable || beyond_frontier);
        }
    }

    fn change_status(&mut self, status: ObjectiveStatus, host: &mut dyn ProgressionHost) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;

        match status {
            ObjectiveStatus::Skipped => {}
            ObjectiveStatus::NotStarted | ObjectiveStatus::InProgress => self.announced = None,
            ObjectiveStatus::Completed | ObjectiveStatus::Failed => {
                if self.announced == Some(status) {
                    return true;
                }
                self.announced = Some(status);

                let quest_id = self.quest_id.clone();
                let objective_id = self.definition.id.clone();
                host.raise(if status == ObjectiveStatus::Completed {
                    ProgressionEvent::ObjectiveCompleted { quest_id, objective_id }
                } else {
                    ProgressionEvent::ObjectiveFailed { quest_id, objective_id }
                });
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::definition::TaskDefinition;
    use crate::quest::host::testing::RecordingHost;

    fn objective(definition: ObjectiveDefinition) -> ObjectiveState {
        ObjectiveState::new(Arc::new(definition), "quest", true)
    }

    fn complete(state: &mut ObjectiveState, index: usize, host: &mut RecordingHost) {
        if state.task_mut(index).force_complete(host) {
            state.notify_task_status_changed(host);
        }
    }

    fn fail(state: &mut ObjectiveState, index: usize, host: &mut RecordingHost) {
        if state.task_mut(index).fail(host) {
            state.notify_task_status_changed(host);
        }
    }

    #[test]
    fn test_completes_when_all_mandatory_complete() {
        let mut host = RecordingHost::new();
        let mut state = objective(ObjectiveDefinition::new(
            "clear",
            vec![
                TaskDefinition::new("a", 1),
                TaskDefinition::new("b", 1),
                TaskDefinition::new("bonus", 1).optional(),
            ],
        ));

        complete(&mut state, 0, &mut host);
        assert_eq!(state.status(), ObjectiveStatus::InProgress);

        complete(&mut state, 1, &mut host);
        assert_eq!(state.status(), ObjectiveStatus::Completed);
        assert_eq!(host.count("objective_completed"), 1);
    }

    #[test]
    fn test_optional_failure_does_not_fail_objective() {
        let mut host = RecordingHost::new();
        let mut state = objective(ObjectiveDefinition::new(
            "clear",
            vec![TaskDefinition::new("a", 1), TaskDefinition::new("bonus", 1).optional()],
        ));

        fail(&mut state, 1, &mut host);
        assert_eq!(state.status(), ObjectiveStatus::InProgress);

        fail(&mut state, 0, &mut host);
        assert_eq!(state.status(), ObjectiveStatus::Failed);
        assert_eq!(host.count("objective_failed"), 1);
    }

    #[test]
    fn test_n_of_m_mandatory() {
        let mut host = RecordingHost::new();
        let mut state = objective(
            ObjectiveDefinition::new(
                "any_two",
                vec![
                    TaskDefinition::new("a", 1),
                    TaskDefinition::new("b", 1),
                    TaskDefinition::new("c", 1),
                ],
            )
            .requiring(2),
        );
        assert_eq!(state.mandatory_tasks_needed(), 2);

        fail(&mut state, 0, &mut host);
        assert_eq!(state.status(), ObjectiveStatus::InProgress);

        complete(&mut state, 1, &mut host);
        complete(&mut state, 2, &mut host);
        assert_eq!(state.status(), ObjectiveStatus::Completed);
    }

    #[test]
    fn test_sequential_visibility_and_next_task() {
        let mut host = RecordingHost::new();
        let mut state = objective(
            ObjectiveDefinition::new(
                "steps",
                vec![
                    TaskDefinition::new("first", 1),
                    TaskDefinition::new("aside", 1).optional(),
                    TaskDefinition::new("second", 1),
                ],
            )
            .sequential(),
        );

        state.update_visibility(true);
        assert_eq!(state.next_mandatory_task().map(|t| t.id()), Some("first"));
        assert!(!state.tasks()[0].is_hidden());
        assert!(state.tasks()[1].is_hidden());
        assert!(state.tasks()[2].is_hidden());

        complete(&mut state, 0, &mut host);
        state.update_visibility(true);
        assert_eq!(state.next_mandatory_task().map(|t| t.id()), Some("second"));
        assert!(state.tasks().iter().all(|t| !t.is_hidden()));

        state.update_visibility(false);
        assert!(state.tasks().iter().all(|t| t.is_hidden()));
    }

    #[test]
    fn test_skipped_ignores_task_progress_until_reactivated() {
        let mut host = RecordingHost::new();
        let mut state = ObjectiveState::new(
            Arc::new(ObjectiveDefinition::new("side", vec![TaskDefinition::new("a", 1)]).on_branch("B")),
            "quest",
            false,
        );
        assert_eq!(state.status(), ObjectiveStatus::Skipped);

        complete(&mut state, 0, &mut host);
        assert_eq!(state.status(), ObjectiveStatus::Skipped);

        assert!(state.set_branch_active(true, &mut host));
        assert_eq!(state.status(), ObjectiveStatus::Completed);

        assert!(state.set_branch_active(false, &mut host));
        assert_eq!(state.status(), ObjectiveStatus::Skipped);
    }

    #[test]
    fn test_branch_toggle_does_not_reannounce_completion() {
        let mut host = RecordingHost::new();
        let mut state = ObjectiveState::new(
            Arc::new(ObjectiveDefinition::new("side", vec![TaskDefinition::new("a", 1)]).on_branch("B")),
            "quest",
            true,
        );

        complete(&mut state, 0, &mut host);
        assert_eq!(host.count("objective_completed"), 1);

        for _ in 0..3 {
            state.set_branch_active(false, &mut host);
            state.set_branch_active(true, &mut host);
            assert_eq!(state.status(), ObjectiveStatus::Completed);
        }
        assert_eq!(host.count("objective_completed"), 1);

        // A real regression re-arms the event
        if state.task_mut(0).reset(&mut host) {
            state.notify_task_status_changed(&mut host);
        }
        assert_eq!(state.status(), ObjectiveStatus::NotStarted);
        complete(&mut state, 0, &mut host);
        assert_eq!(host.count("objective_completed"), 2);
    }
}
