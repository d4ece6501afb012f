//! Progression Event Types
//!
//! Events raised by the state machine for external consumers (UI, save
//! system, achievements). Delivered synchronously to registered listeners.

use serde::{Deserialize, Serialize};

use super::status::TaskStatus;

/// Point-in-time view of a task, carried by task events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub quest_id: String,
    pub objective_id: String,
    pub task_id: String,
    pub status: TaskStatus,
    pub number: i32,
    pub target_number: i32,
    pub time_remaining: f32,
    pub hidden: bool,
}

/// Events raised while quests progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressionEvent {
    /// Any change to a task's status, number or time
    TaskUpdated(TaskSnapshot),
    TaskCompleted(TaskSnapshot),
    TaskFailed(TaskSnapshot),
    ObjectiveCompleted {
        quest_id: String,
        objective_id: String,
    },
    ObjectiveFailed {
        quest_id: String,
        objective_id: String,
    },
    QuestAccepted {
        quest_id: String,
    },
    QuestCompleted {
        quest_id: String,
    },
    QuestFailed {
        quest_id: String,
    },
}

impl ProgressionEvent {
    /// Get the quest ID associated with this event
    pub fn quest_id(&self) -> &str {
        match self {
            ProgressionEvent::TaskUpdated(task)
            | ProgressionEvent::TaskCompleted(task)
            | ProgressionEvent::TaskFailed(task) => &task.quest_id,
            ProgressionEvent::ObjectiveCompleted { quest_id, .. }
            | ProgressionEvent::ObjectiveFailed { quest_id, .. }
            | ProgressionEvent::QuestAccepted { quest_id }
            | ProgressionEvent::QuestCompleted { quest_id }
            | ProgressionEvent::QuestFailed { quest_id } => quest_id,
        }
    }

    /// The task this event is about, if any
    pub fn task(&self) -> Option<&TaskSnapshot> {
        match self {
            ProgressionEvent::TaskUpdated(task)
            | ProgressionEvent::TaskCompleted(task)
            | ProgressionEvent::TaskFailed(task) => Some(task),
            _ => None,
        }
    }

    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressionEvent::TaskUpdated(_) => "task_updated",
            ProgressionEvent::TaskCompleted(_) => "task_completed",
            ProgressionEvent::TaskFailed(_) => "task_failed",
            ProgressionEvent::ObjectiveCompleted { .. } => "objective_completed",
            ProgressionEvent::ObjectiveFailed { .. } => "objective_failed",
            ProgressionEvent::QuestAccepted { .. } => "quest_accepted",
            ProgressionEvent::QuestCompleted { .. } => "quest_completed",
            ProgressionEvent::QuestFailed { .. } => "quest_failed",
        }
    }
}

/// Observer for progression events
///
/// Any `FnMut(&ProgressionEvent)` closure is a listener. Listeners must not
/// call back into the progression that raised the event.
pub trait ProgressionListener {
    fn on_event(&mut self, event: &ProgressionEvent);
}

impl<F> ProgressionListener for F
where
    F: FnMut(&ProgressionEvent),
{
    fn on_event(&mut self, event: &ProgressionEvent) {
        self(event)
    }
}
