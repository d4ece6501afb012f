//! Quest Progression
//!
//! Root of the runtime: owns accepted quest states, named gates, the
//! barrier policy and event listeners, and drives the per-frame tick.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::barrier::{BarrierSettings, ResolveBarrier};
use super::definition::TaskDefinition;
use super::events::{ProgressionEvent, ProgressionListener};
use super::host::ProgressionHost;
use super::registry::QuestRegistry;
use super::state::{QuestState, TaskHandle};
use super::status::{QuestStatus, TaskStatus};
use super::task::TaskState;
use crate::config::ProgressionConfig;

/// Gate state, barrier policy and listeners, lent to quest state as its host
pub struct ProgressionContext {
    default_barrier: BarrierSettings,
    open_gates: HashSet<String>,
    listeners: Vec<Box<dyn ProgressionListener>>,
}

impl ProgressionContext {
    fn new(default_barrier: BarrierSettings) -> Self {
        Self {
            default_barrier,
            open_gates: HashSet::new(),
            listeners: Vec::new(),
        }
    }
}

impl ProgressionHost for ProgressionContext {
    fn barrier_for_task(&self, task: &TaskDefinition, status: TaskStatus) -> ResolveBarrier {
        task.barrier
            .as_ref()
            .unwrap_or(&self.default_barrier)
            .barrier_for(status)
    }

    fn is_gate_open(&self, gate: &str) -> bool {
        self.open_gates.contains(gate)
    }

    fn raise(&mut self, event: ProgressionEvent) {
        match &event {
            ProgressionEvent::QuestCompleted { quest_id } => info!("Quest '{}' completed", quest_id),
            ProgressionEvent::QuestFailed { quest_id } => info!("Quest '{}' failed", quest_id),
            _ => match event.task() {
                Some(task) => debug!(
                    "{} for task '{}' in quest '{}' ({}/{})",
                    event.event_type(),
                    task.task_id,
                    task.quest_id,
                    task.number,
                    task.target_number
                ),
                None => debug!("{} in quest '{}'", event.event_type(), event.quest_id()),
            },
        }
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }
}

/// All quest progress for one player or save slot
pub struct Progression {
    registry: Arc<QuestRegistry>,
    quests: BTreeMap<String, QuestState>,
    context: ProgressionContext,
}

impl Progression {
    pub fn new(registry: Arc<QuestRegistry>, config: &ProgressionConfig) -> Self {
        let barrier = &config.default_barrier;
        if barrier.is_blocking() {
            info!(
                "Default resolve barrier holds notifications for {:.2}s, gate '{}'",
                barrier.time, barrier.gate
            );
        }
        Self {
            registry,
            quests: BTreeMap::new(),
            context: ProgressionContext::new(config.default_barrier.clone()),
        }
    }

    pub fn registry(&self) -> &QuestRegistry {
        &self.registry
    }

    pub fn add_listener(&mut self, listener: impl ProgressionListener + 'static) {
        self.context.listeners.push(Box::new(listener));
    }

    /// Start tracking a quest. Accepting an already accepted quest is a no-op.
    pub fn accept_quest(&mut self, quest_id: &str) -> bool {
        if self.quests.contains_key(quest_id) {
            return true;
        }
        let Some(definition) = self.registry.get(quest_id) else {
            warn!("Tried to accept unknown quest '{}'", quest_id);
            return false;
        };

        info!("Quest '{}' accepted", quest_id);
        self.context.raise(ProgressionEvent::QuestAccepted {
            quest_id: quest_id.to_string(),
        });
        let state = QuestState::new(definition, &mut self.context);
        self.quests.insert(quest_id.to_string(), state);
        true
    }

    /// Stop tracking a quest; it becomes unavailable again
    pub fn remove_quest(&mut self, quest_id: &str) -> bool {
        self.quests.remove(quest_id).is_some()
    }

    pub fn quest_status(&self, quest_id: &str) -> QuestStatus {
        self.quests
            .get(quest_id)
            .map_or(QuestStatus::Unavailable, QuestState::status)
    }

    pub fn quest(&self, quest_id: &str) -> Option<&QuestState> {
        self.quests.get(quest_id)
    }

    pub fn quests(&self) -> impl Iterator<Item = &QuestState> {
        self.quests.values()
    }

    pub fn find_task(&self, quest_id: &str, task_id: &str) -> Option<&TaskState> {
        self.quests.get(quest_id)?.find_task(task_id)
    }

    /// Mutable access to a task of an accepted quest
    pub fn task_mut(&mut self, quest_id: &str, task_id: &str) -> Option<TaskHandle<'_>> {
        let Some(quest) = self.quests.get_mut(quest_id) else {
            debug!("Quest '{}' has not been accepted", quest_id);
            return None;
        };
        quest.task_mut(task_id, &mut self.context)
    }

    pub fn complete_task(&mut self, quest_id: &str, task_id: &str) -> bool {
        self.task_mut(quest_id, task_id)
            .is_some_and(|mut task| task.complete())
    }

    pub fn fail_task(&mut self, quest_id: &str, task_id: &str) -> bool {
        let Some(mut task) = self.task_mut(quest_id, task_id) else {
            return false;
        };
        task.fail();
        true
    }

    /// Returns the amount outstanding, or None if the task was not found
    pub fn progress_task(&mut self, quest_id: &str, task_id: &str, delta: i32) -> Option<i32> {
        self.task_mut(quest_id, task_id)
            .map(|mut task| task.progress(delta))
    }

    pub fn reset_quest(&mut self, quest_id: &str) -> bool {
        let Some(quest) = self.quests.get_mut(quest_id) else {
            return false;
        };
        info!("Quest '{}' reset", quest_id);
        quest.reset(&mut self.context);
        true
    }

    /// Fail every unresolved task of a quest
    pub fn fail_quest(&mut self, quest_id: &str) -> bool {
        let Some(quest) = self.quests.get_mut(quest_id) else {
            return false;
        };
        quest.fail(&mut self.context);
        true
    }

    pub fn set_branch_active(&mut self, quest_id: &str, branch: &str, active: bool) -> bool {
        let Some(quest) = self.quests.get_mut(quest_id) else {
            return false;
        };
        quest.set_branch_active(branch, active, &mut self.context);
        true
    }

    pub fn is_branch_active(&self, quest_id: &str, branch: &str) -> bool {
        self.quests
            .get(quest_id)
            .is_some_and(|q| q.is_branch_active(branch))
    }

    /// Open or close a gate. Opening releases every barrier waiting on it.
    pub fn set_gate_open(&mut self, gate: &str, open: bool) {
        if !open {
            self.context.open_gates.remove(gate);
            return;
        }
        if !self.context.open_gates.insert(gate.to_string()) {
            return;
        }

        debug!("Gate '{}' opened", gate);
        for quest in self.quests.values_mut() {
            quest.notify_gate_opened(gate, &mut self.context);
        }
    }

    pub fn is_gate_open(&self, gate: &str) -> bool {
        self.context.is_gate_open(gate)
    }

    /// Advance every accepted quest by one frame
    pub fn tick(&mut self, delta_time: f32) {
        for quest in self.quests.values_mut() {
            quest.tick(delta_time, &mut self.context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::definition::{ObjectiveDefinition, QuestDefinition};
    use crate::quest::status::ObjectiveStatus;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn registry() -> Arc<QuestRegistry> {
        let mut registry = QuestRegistry::new();
        registry
            .insert(QuestDefinition::new(
                "gather",
                vec![ObjectiveDefinition::new(
                    "wood",
                    vec![TaskDefinition::new("logs", 3)],
                )],
            ))
            .unwrap();
        registry
            .insert(QuestDefinition::new(
                "timed",
                vec![ObjectiveDefinition::new(
                    "race",
                    vec![TaskDefinition::new("finish", 1).with_time_limit(5.0)],
                )],
            ))
            .unwrap();
        registry
            .insert(QuestDefinition::new(
                "ritual",
                vec![
                    ObjectiveDefinition::new(
                        "prepare",
                        vec![TaskDefinition::new("candles", 1), TaskDefinition::new("chant", 1)],
                    )
                    .sequential(),
                ],
            ))
            .unwrap();
        registry
            .insert(QuestDefinition::new(
                "fork",
                vec![
                    ObjectiveDefinition::new("main", vec![TaskDefinition::new("deliver", 1)]),
                    ObjectiveDefinition::new(
                        "secret",
                        vec![TaskDefinition::new("steal", 1), TaskDefinition::new("hide", 1)],
                    )
                    .on_branch("B"),
                ],
            ))
            .unwrap();
        registry
            .insert(QuestDefinition::new(
                "finale",
                vec![ObjectiveDefinition::new(
                    "defeat",
                    vec![TaskDefinition::new("boss", 1)],
                )],
            ))
            .unwrap();
        Arc::new(registry)
    }

    fn progression() -> Progression {
        Progression::new(registry(), &ProgressionConfig::default())
    }

    fn gated_progression() -> Progression {
        let config = ProgressionConfig {
            default_barrier: BarrierSettings {
                time: 1.0,
                gate: "outro".to_string(),
                ..BarrierSettings::default()
            },
            ..ProgressionConfig::default()
        };
        Progression::new(registry(), &config)
    }

    fn record(progression: &mut Progression) -> Rc<RefCell<Vec<ProgressionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        progression.add_listener(move |event: &ProgressionEvent| {
            sink.borrow_mut().push(event.clone());
        });
        events
    }

    #[test]
    fn test_accept_quest() {
        let mut progression = progression();
        let events = record(&mut progression);

        assert_eq!(progression.quest_status("gather"), QuestStatus::Unavailable);
        assert!(progression.accept_quest("gather"));
        assert_eq!(progression.quest_status("gather"), QuestStatus::NotStarted);
        assert!(progression.accept_quest("gather"));
        assert!(!progression.accept_quest("unknown"));

        assert_eq!(events.borrow().len(), 1);
        assert_eq!(events.borrow()[0].event_type(), "quest_accepted");
    }

    #[test]
    fn test_scenario_numeric_progress() {
        let mut progression = progression();
        progression.accept_quest("gather");

        assert_eq!(progression.progress_task("gather", "logs", 2), Some(1));
        let logs = progression.find_task("gather", "logs").unwrap();
        assert_eq!(logs.number(), 2);
        assert_eq!(logs.status(), TaskStatus::InProgress);

        assert_eq!(progression.progress_task("gather", "logs", 1), Some(0));
        let logs = progression.find_task("gather", "logs").unwrap();
        assert_eq!(logs.number(), 3);
        assert_eq!(logs.status(), TaskStatus::Completed);
        assert_eq!(progression.quest_status("gather"), QuestStatus::Completed);

        assert_eq!(progression.progress_task("gather", "missing", 1), None);
        assert_eq!(progression.progress_task("timed", "finish", 1), None);
    }

    #[test]
    fn test_scenario_time_limit() {
        let mut progression = progression();
        let events = record(&mut progression);
        progression.accept_quest("timed");

        progression.tick(5.0);
        let finish = progression.find_task("timed", "finish").unwrap();
        assert_eq!(finish.status(), TaskStatus::Failed);
        assert_eq!(finish.time_remaining(), 0.0);
        assert_eq!(progression.quest_status("timed"), QuestStatus::Failed);

        let types: Vec<_> = events.borrow().iter().map(|e| e.event_type()).collect();
        assert!(types.contains(&"task_failed"));
        assert!(types.contains(&"objective_failed"));
        assert_eq!(types.last(), Some(&"quest_failed"));
    }

    #[test]
    fn test_scenario_sequential_objective() {
        let mut progression = progression();
        progression.accept_quest("ritual");

        assert!(!progression.complete_task("ritual", "chant"));
        assert_eq!(
            progression.find_task("ritual", "chant").unwrap().status(),
            TaskStatus::NotStarted
        );

        assert!(progression.complete_task("ritual", "candles"));
        assert!(progression.complete_task("ritual", "chant"));
        assert_eq!(progression.quest_status("ritual"), QuestStatus::Completed);
    }

    #[test]
    fn test_scenario_inactive_branch() {
        let mut progression = progression();
        progression.accept_quest("fork");
        assert!(!progression.is_branch_active("fork", "B"));

        progression.progress_task("fork", "steal", 1);
        assert!(progression.complete_task("fork", "deliver"));
        assert_eq!(progression.quest_status("fork"), QuestStatus::Completed);

        progression.set_branch_active("fork", "B", true);
        assert!(progression.is_branch_active("fork", "B"));
        assert_eq!(progression.quest_status("fork"), QuestStatus::InProgress);
        let secret = progression.quest("fork").unwrap().find_objective("secret").unwrap();
        assert_eq!(secret.status(), ObjectiveStatus::InProgress);
    }

    #[test]
    fn test_complete_twice_raises_no_duplicate_events() {
        let mut progression = progression();
        let events = record(&mut progression);
        progression.accept_quest("finale");

        assert!(progression.complete_task("finale", "boss"));
        let count = events.borrow().len();
        assert!(progression.complete_task("finale", "boss"));
        assert_eq!(events.borrow().len(), count);
    }

    #[test]
    fn test_barrier_time_then_gate() {
        let mut progression = gated_progression();
        progression.accept_quest("finale");

        assert!(progression.complete_task("finale", "boss"));
        assert_eq!(progression.quest_status("finale"), QuestStatus::NotStarted);

        progression.tick(1.0);
        assert_eq!(progression.quest_status("finale"), QuestStatus::NotStarted);

        progression.set_gate_open("outro", true);
        assert_eq!(progression.quest_status("finale"), QuestStatus::Completed);
    }

    #[test]
    fn test_barrier_gate_then_time() {
        let mut progression = gated_progression();
        let events = record(&mut progression);
        progression.accept_quest("finale");

        assert!(progression.complete_task("finale", "boss"));
        progression.set_gate_open("outro", true);
        assert!(progression.is_gate_open("outro"));
        assert_eq!(progression.quest_status("finale"), QuestStatus::NotStarted);

        progression.tick(0.5);
        assert_eq!(progression.quest_status("finale"), QuestStatus::NotStarted);
        progression.tick(0.5);
        assert_eq!(progression.quest_status("finale"), QuestStatus::Completed);

        // Task events fire at the status change, quest events at release
        let types: Vec<_> = events.borrow().iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                "quest_accepted",
                "task_updated",
                "task_completed",
                "objective_completed",
                "quest_completed"
            ]
        );
    }

    #[test]
    fn test_closing_gate_keeps_it_closed_for_new_barriers() {
        let mut progression = gated_progression();
        progression.accept_quest("gather");
        progression.set_gate_open("outro", true);
        progression.set_gate_open("outro", false);
        assert!(!progression.is_gate_open("outro"));

        progression.progress_task("gather", "logs", 3);
        progression.tick(1.0);
        assert_eq!(progression.quest_status("gather"), QuestStatus::NotStarted);
    }

    #[test]
    fn test_reset_and_fail_quest() {
        let mut progression = progression();
        progression.accept_quest("gather");
        progression.progress_task("gather", "logs", 3);
        assert_eq!(progression.quest_status("gather"), QuestStatus::Completed);

        assert!(progression.reset_quest("gather"));
        assert_eq!(progression.quest_status("gather"), QuestStatus::NotStarted);
        assert_eq!(progression.find_task("gather", "logs").unwrap().number(), 0);

        assert!(progression.fail_quest("gather"));
        assert_eq!(progression.quest_status("gather"), QuestStatus::Failed);

        assert!(progression.remove_quest("gather"));
        assert_eq!(progression.quest_status("gather"), QuestStatus::Unavailable);
        assert!(!progression.reset_quest("gather"));
    }

    #[test]
    fn test_fail_task() {
        let mut progression = progression();
        progression.accept_quest("ritual");
        assert!(progression.fail_task("ritual", "candles"));
        assert!(!progression.fail_task("ritual", "missing"));
        assert_eq!(progression.quest_status("ritual"), QuestStatus::Failed);
    }

    #[test]
    fn test_restore_through_direct_set() {
        let mut progression = progression();
        progression.accept_quest("timed");

        let mut finish = progression.task_mut("timed", "finish").unwrap();
        finish.set_time_remaining(1.25);
        assert_eq!(finish.state().time_remaining(), 1.25);
        finish.set_time_remaining(-2.0);
        assert_eq!(finish.state().time_remaining(), 0.0);
        assert_eq!(finish.state().status(), TaskStatus::Failed);

        finish.reset();
        finish.set_number(1);
        assert_eq!(progression.quest_status("timed"), QuestStatus::Completed);
    }

    #[test]
    fn test_invariants_hold_under_random_walk() {
        let mut progression = progression();
        progression.accept_quest("gather");
        progression.accept_quest("timed");

        let deltas = [5, -7, 2, 0, 1, -1, 9, -3, 4];
        for (step, delta) in deltas.iter().enumerate() {
            progression.progress_task("gather", "logs", *delta);
            progression.tick(0.7 * step as f32);

            for quest in progression.quests() {
                for objective in quest.objectives() {
                    for task in objective.tasks() {
                        assert!(task.number() >= 0 && task.number() <= task.target_number());
                        assert!(task.time_remaining() >= 0.0);
                        if task.status() == TaskStatus::Completed {
                            assert_eq!(task.number(), task.target_number());
                        }
                    }
                }
            }
        }
    }
}
