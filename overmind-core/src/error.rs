//! Error types for Overmind operations

use crate::{AgentId, ResourceUsage, SubTaskId, TaskId};
use thiserror::Error;

/// Resource admission errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Insufficient resources: requested {requested}, available {available}")]
    Insufficient {
        requested: ResourceUsage,
        available: ResourceUsage,
    },
}

/// Agent registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Agent blueprint already registered: {name}")]
    DuplicateName { name: String },

    #[error("Agent blueprint not found: {name}")]
    NotFound { name: String },
}

/// Agent runtime and orchestration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not active: {agent_id}")]
    NotActive { agent_id: AgentId },

    #[error("Task {task_id} has no assigned agents")]
    NoAgentAssigned { task_id: TaskId },

    #[error("Agent {agent_id} is {phase}, expected idle")]
    NotIdle { agent_id: AgentId, phase: String },

    #[error("Learning strategy '{strategy}' failed for agent {agent_id}: {reason}")]
    LearningFailed {
        agent_id: AgentId,
        strategy: String,
        reason: String,
    },
}

/// Task decomposition errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecomposeError {
    #[error("Invalid decomposition response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Decomposition produced no subtasks")]
    EmptyPlan,

    #[error("Subtask {subtask_id} depends on unknown sibling {dependency_id}")]
    UnknownDependency {
        subtask_id: SubTaskId,
        dependency_id: SubTaskId,
    },

    #[error("Task {task_id} has no subtask {subtask_id}")]
    UnknownSubtask {
        task_id: TaskId,
        subtask_id: SubTaskId,
    },
}

/// Evolution pipeline errors.
///
/// These never escape the evolution manager: they are folded into a
/// structured report before reaching the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvolutionError {
    #[error("Evolution strategy not found: {name}")]
    StrategyNotFound { name: String },

    #[error("Improvement plan generation failed: {reason}")]
    PlanGeneration { reason: String },

    #[error("Evolution verification failed: {reason}")]
    VerificationFailed { reason: String },
}

/// Text-generation and classification provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Master error type for all Overmind errors.
#[derive(Debug, Clone, Error)]
pub enum OvermindError {
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Decomposition error: {0}")]
    Decompose(#[from] DecomposeError),

    #[error("Evolution error: {0}")]
    Evolution(#[from] EvolutionError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Result type alias for Overmind operations.
pub type OvermindResult<T> = Result<T, OvermindError>;

// =============================================================================
// TESTS
// =============================================================================
