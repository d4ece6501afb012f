//! Quest progression tracking.
//!
//! Load quest definitions with [`QuestRegistry`], accept them into a
//! [`Progression`], then drive it with task operations and `tick`.

pub mod config;
pub mod quest;

pub use config::ProgressionConfig;
pub use quest::{
    ObjectiveStatus, Progression, ProgressionEvent, QuestDefinition, QuestRegistry, QuestStatus,
    TaskStatus,
};
