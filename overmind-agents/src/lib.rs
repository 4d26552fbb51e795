//! Overmind Agents - Agent runtime and adaptation
//!
//! Provides the capability-bearing worker side of the engine:
//! - Agent runtime: phase machine, three-part memory, rolling metrics,
//!   and the text-generation call boundary
//! - Agent registry: declarative blueprints looked up by name or capability
//! - Evolution manager: pluggable strategies that adapt underperforming
//!   agents

mod evolution;
mod registry;
mod runtime;

pub use evolution::*;
pub use registry::*;
pub use runtime::*;
