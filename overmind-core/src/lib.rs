//! Overmind Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no business logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

mod config;
mod entities;
mod enums;
mod error;
mod event;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use event::*;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Identifier for an agent runtime.
pub type AgentId = Uuid;

/// Identifier for a task.
pub type TaskId = Uuid;

/// Identifier for a subtask within a task.
pub type SubTaskId = Uuid;

/// Identifier for a recorded experience.
pub type ExperienceId = Uuid;

/// Identifier for a knowledge-graph concept node.
pub type ConceptId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
