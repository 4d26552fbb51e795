//! Overmind Engine - Coordination layer
//!
//! Ties the agent layer to shared system state:
//! - Resource pool: four-dimension budget with all-or-nothing admission
//! - Task decomposer: classifier-backed subtask DAGs with readiness tracking
//! - Knowledge graph: weighted concept graph feeding prompt context
//! - Orchestrator: active agents and tasks, lifecycle events, inline
//!   post-task evolution
//! - Node facade: the single entry point running the request pipeline and
//!   deriving system metrics from lifecycle events

mod decompose;
mod knowledge;
mod node;
mod orchestrator;
mod resources;

pub use decompose::*;
pub use knowledge::*;
pub use node::*;
pub use orchestrator::*;
pub use resources::*;
