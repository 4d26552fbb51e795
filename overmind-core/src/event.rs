//! Lifecycle event types.
//!
//! Orchestration progress is reported through a closed tagged union of
//! lifecycle events, wrapped in an envelope carrying the emission timestamp.
//! Subscribers receive events synchronously, in registration order, at the
//! point they are emitted.

use chrono::Utc;
use crate::{AgentId, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an emitted event.
pub type EventId = Uuid;

// ============================================================================
// EVENT KIND
// ============================================================================

/// Discriminant for the closed set of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    AgentCreated,
    AgentDestroyed,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    LearningStarted,
    LearningCompleted,
    EvolutionStarted,
    EvolutionCompleted,
    Error,
}

impl EventKind {
    /// Convert to wire/string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            EventKind::AgentCreated => "agent_created",
            EventKind::AgentDestroyed => "agent_destroyed",
            EventKind::TaskStarted => "task_started",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskFailed => "task_failed",
            EventKind::LearningStarted => "learning_started",
            EventKind::LearningCompleted => "learning_completed",
            EventKind::EvolutionStarted => "evolution_started",
            EventKind::EvolutionCompleted => "evolution_completed",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// LIFECYCLE EVENT
// ============================================================================

/// A lifecycle event emitted by the orchestrator or an agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// An agent runtime was created and registered
    AgentCreated { agent_id: AgentId, name: String },
    /// An agent runtime was removed from the active set
    AgentDestroyed { agent_id: AgentId },
    /// Task execution started
    TaskStarted { task_id: TaskId, agent_id: AgentId },
    /// Task execution completed successfully
    TaskCompleted {
        task_id: TaskId,
        agent_id: AgentId,
        duration_ms: i64,
    },
    /// Task execution failed
    TaskFailed {
        task_id: TaskId,
        agent_id: AgentId,
        error: String,
    },
    /// An agent began applying learning strategies
    LearningStarted { agent_id: AgentId },
    /// An agent finished applying learning strategies
    LearningCompleted { agent_id: AgentId },
    /// An agent began evolving
    EvolutionStarted { agent_id: AgentId, strategy: String },
    /// An agent finished evolving
    EvolutionCompleted { agent_id: AgentId, success: bool },
    /// A failure outside the task lifecycle (e.g. provider error)
    Error {
        agent_id: Option<AgentId>,
        message: String,
    },
}

impl LifecycleEvent {
    /// The discriminant for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::AgentCreated { .. } => EventKind::AgentCreated,
            LifecycleEvent::AgentDestroyed { .. } => EventKind::AgentDestroyed,
            LifecycleEvent::TaskStarted { .. } => EventKind::TaskStarted,
            LifecycleEvent::TaskCompleted { .. } => EventKind::TaskCompleted,
            LifecycleEvent::TaskFailed { .. } => EventKind::TaskFailed,
            LifecycleEvent::LearningStarted { .. } => EventKind::LearningStarted,
            LifecycleEvent::LearningCompleted { .. } => EventKind::LearningCompleted,
            LifecycleEvent::EvolutionStarted { .. } => EventKind::EvolutionStarted,
            LifecycleEvent::EvolutionCompleted { .. } => EventKind::EvolutionCompleted,
            LifecycleEvent::Error { .. } => EventKind::Error,
        }
    }

    /// The agent this event concerns, when there is one.
    pub fn agent_id(&self) -> Option<AgentId> {
        match self {
            LifecycleEvent::AgentCreated { agent_id, .. }
            | LifecycleEvent::AgentDestroyed { agent_id }
            | LifecycleEvent::TaskStarted { agent_id, .. }
            | LifecycleEvent::TaskCompleted { agent_id, .. }
            | LifecycleEvent::TaskFailed { agent_id, .. }
            | LifecycleEvent::LearningStarted { agent_id }
            | LifecycleEvent::LearningCompleted { agent_id }
            | LifecycleEvent::EvolutionStarted { agent_id, .. }
            | LifecycleEvent::EvolutionCompleted { agent_id, .. } => Some(*agent_id),
            LifecycleEvent::Error { agent_id, .. } => *agent_id,
        }
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// An event plus its emission metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this emission
    pub event_id: EventId,
    /// When the event was emitted
    pub timestamp: Timestamp,
    /// The event payload
    pub event: LifecycleEvent,
}

impl EventEnvelope {
    /// Wrap an event, stamping the present time.
    pub fn new(event: LifecycleEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event,
        }
    }

    /// Shorthand for the payload's kind.
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

// ============================================================================
// TESTS
// ============================================================================
