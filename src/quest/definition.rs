//! Quest Definition Structures
//!
//! Raw structures are deserialized from TOML quest files and resolved into
//! immutable definitions. Runtime state never mutates a definition; it only
//! holds `Arc`s into the resolved tree.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use super::barrier::BarrierSettings;

/// A quest definition file
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objectives: Vec<RawObjective>,
}

/// Raw objective as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawObjective {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Mandatory tasks must be completed in order
    #[serde(default)]
    pub sequential: bool,
    /// Branch this objective belongs to; empty means always active
    #[serde(default)]
    pub branch: String,
    /// How many mandatory tasks complete the objective (all when absent)
    #[serde(default)]
    pub mandatory_required: Option<usize>,
    #[serde(default)]
    pub tasks: Vec<RawTask>,
}

/// Raw task as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_target")]
    pub target: i32,
    /// Seconds; 0 means unlimited
    #[serde(default)]
    pub time_limit: f32,
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
    #[serde(default)]
    pub barrier: Option<BarrierSettings>,
}

fn default_target() -> i32 {
    1
}

fn default_mandatory() -> bool {
    true
}

// ============================================================================
// Resolved Definitions
// ============================================================================

/// A single trackable task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub id: String,
    pub title: String,
    /// Progress goal, at least 1
    pub target_number: i32,
    /// Seconds; 0 means unlimited
    pub time_limit: f32,
    pub mandatory: bool,
    /// Position among sibling tasks
    pub order_index: usize,
    /// Overrides the progression's default barrier policy
    pub barrier: Option<BarrierSettings>,
}

impl TaskDefinition {
    pub fn new(id: &str, target_number: i32) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            target_number,
            time_limit: 0.0,
            mandatory: true,
            order_index: 0,
            barrier: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_time_limit(mut self, seconds: f32) -> Self {
        self.time_limit = seconds;
        self
    }

    pub fn with_barrier(mut self, barrier: BarrierSettings) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    pub fn is_time_limited(&self) -> bool {
        self.time_limit > 0.0
    }

    fn from_raw(raw: &RawTask) -> Self {
        Self {
            id: raw.id.clone(),
            title: raw.title.clone(),
            target_number: raw.target,
            time_limit: raw.time_limit,
            mandatory: raw.mandatory,
            order_index: 0,
            barrier: raw.barrier.clone(),
        }
    }
}

/// An ordered group of tasks
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveDefinition {
    pub id: String,
    pub title: String,
    pub tasks: Vec<Arc<TaskDefinition>>,
    pub sequential: bool,
    /// Empty means always active
    pub branch: String,
    pub mandatory_required: Option<usize>,
}

impl ObjectiveDefinition {
    /// Create an objective; task order indexes follow `tasks` order
    pub fn new(id: &str, tasks: Vec<TaskDefinition>) -> Self {
        let tasks = tasks
            .into_iter()
            .enumerate()
            .map(|(index, mut task)| {
                task.order_index = index;
                Arc::new(task)
            })
            .collect();

        Self {
            id: id.to_string(),
            title: String::new(),
            tasks,
            sequential: false,
            branch: String::new(),
            mandatory_required: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    pub fn on_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    /// Complete after `count` mandatory tasks instead of all of them
    pub fn requiring(mut self, count: usize) -> Self {
        self.mandatory_required = Some(count);
        self
    }

    pub fn mandatory_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.mandatory).count()
    }

    /// Number of completed mandatory tasks needed to complete the objective
    pub fn mandatory_tasks_needed(&self) -> usize {
        let total = self.mandatory_task_count();
        self.mandatory_required.map_or(total, |n| n.min(total))
    }

    pub fn find_task(&self, id: &str) -> Option<&Arc<TaskDefinition>> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn from_raw(raw: &RawObjective) -> Self {
        let tasks = raw.tasks.iter().map(TaskDefinition::from_raw).collect();
        let mut objective = Self::new(&raw.id, tasks).with_title(&raw.title);
        objective.sequential = raw.sequential;
        objective.branch = raw.branch.clone();
        objective.mandatory_required = raw.mandatory_required;
        objective
    }
}

/// A fully resolved quest definition
#[derive(Debug, Clone, PartialEq)]
pub struct QuestDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub objectives: Vec<Arc<ObjectiveDefinition>>,
}

impl QuestDefinition {
    pub fn new(id: &str, objectives: Vec<ObjectiveDefinition>) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            description: String::new(),
            objectives: objectives.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Create a QuestDefinition from raw TOML data
    pub fn from_raw(raw: &RawQuest) -> Result<Self, String> {
        let objectives = raw.objectives.iter().map(ObjectiveDefinition::from_raw).collect();
        let mut quest = Self::new(&raw.id, objectives).with_title(&raw.title);
        quest.description = raw.description.clone();
        quest.validate()?;
        Ok(quest)
    }

    /// Parse and validate a `[quest]` TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let raw: RawQuestFile =
            toml::from_str(content).map_err(|e| format!("Failed to parse quest: {}", e))?;
        Self::from_raw(&raw.quest)
    }

    pub fn find_task(&self, id: &str) -> Option<&Arc<TaskDefinition>> {
        self.objectives.iter().find_map(|o| o.find_task(id))
    }

    /// Every branch name referenced by an objective
    pub fn branches(&self) -> Vec<&str> {
        let mut branches: Vec<&str> = self
            .objectives
            .iter()
            .map(|o| o.branch.as_str())
            .filter(|b| !b.is_empty())
            .collect();
        branches.sort_unstable();
        branches.dedup();
        branches
    }

    /// Check structural rules the runtime relies on
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("Quest has an empty id".to_string());
        }
        if self.objectives.is_empty() {
            return Err(format!("Quest '{}' has no objectives", self.id));
        }

        let mut objective_ids = HashSet::new();
        let mut task_ids = HashSet::new();

        for objective in &self.objectives {
            if objective.id.is_empty() {
                return Err(format!("Quest '{}' has an objective with an empty id", self.id));
            }
            if !objective_ids.insert(objective.id.as_str()) {
                return Err(format!(
                    "Quest '{}' has duplicate objective '{}'",
                    self.id, objective.id
                ));
            }
            if objective.tasks.is_empty() {
                return Err(format!(
                    "Objective '{}' in quest '{}' has no tasks",
                    objective.id, self.id
                ));
            }

            let mandatory = objective.mandatory_task_count();
            if mandatory == 0 {
                return Err(format!(
                    "Objective '{}' in quest '{}' has no mandatory tasks",
                    objective.id, self.id
                ));
            }
            if let Some(required) = objective.mandatory_required {
                if required == 0 || required > mandatory {
                    return Err(format!(
                        "Objective '{}' requires {} mandatory tasks but has {}",
                        objective.id, required, mandatory
                    ));
                }
            }

            for task in &objective.tasks {
                if task.id.is_empty() {
                    return Err(format!(
                        "Objective '{}' in quest '{}' has a task with an empty id",
                        objective.id, self.id
                    ));
                }
                if !task_ids.insert(task.id.as_str()) {
                    return Err(format!(
                        "Quest '{}' has duplicate task '{}'",
                        self.id, task.id
                    ));
                }
                if task.target_number < 1 {
                    return Err(format!(
                        "Task '{}' has target {} (must be at least 1)",
                        task.id, task.target_number
                    ));
                }
                if !task.time_limit.is_finite() || task.time_limit < 0.0 {
                    return Err(format!(
                        "Task '{}' has invalid time limit {}",
                        task.id, task.time_limit
                    ));
                }
            }
        }

        Ok(())
    }
}
