//! Quest System Module
//!
//! Runtime progress of Quest -> Objective -> Task hierarchies against
//! TOML-authored definitions, with sequencing, time limits, branches and
//! resolve barriers that gate upward propagation.

pub mod barrier;
pub mod definition;
pub mod events;
pub mod host;
pub mod objective;
pub mod progression;
pub mod registry;
pub mod state;
pub mod status;
pub mod task;

pub use barrier::{BarrierConditions, BarrierSettings, ResolveBarrier};
pub use definition::{ObjectiveDefinition, QuestDefinition, TaskDefinition};
pub use events::{ProgressionEvent, ProgressionListener, TaskSnapshot};
pub use host::ProgressionHost;
pub use objective::ObjectiveState;
pub use progression::Progression;
pub use registry::QuestRegistry;
pub use state::{QuestState, TaskHandle};
pub use status::{ObjectiveStatus, QuestStatus, TaskStatus};
pub use task::TaskState;
