//! Core entity structures

use chrono::Utc;
use crate::{
    AgentId, AgentStatus, ConceptId, ExperienceId, SubTaskId, TaskId, TaskPriority, TaskStatus,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

/// Immutable configuration for an agent runtime.
///
/// Constructed once when the agent is created; the runtime never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique identifier for this agent
    pub agent_id: AgentId,
    /// Human-readable name (used in the persona prompt)
    pub name: String,
    /// Description of the agent's purpose (used in the persona prompt)
    pub description: String,
    /// Model identifier passed to the text-generation provider
    pub model: String,
    /// Generation temperature
    pub temperature: f32,
    /// Maximum output size in tokens
    pub max_tokens: u32,
    /// Capabilities this agent starts with
    pub capabilities: Vec<String>,
    /// Learning rate applied by learning strategies
    pub learning_rate: f64,
    /// Success-rate floor below which evolution triggers
    pub evolution_threshold: f64,
    /// Episodic memory retention window in days
    pub memory_retention_days: i64,
}

impl AgentConfig {
    /// Create a new agent configuration with a fresh id.
    pub fn new(name: &str, description: &str, model: &str) -> Self {
        Self {
            agent_id: Uuid::now_v7(),
            name: name.to_string(),
            description: description.to_string(),
            model: model.to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            capabilities: Vec::new(),
            learning_rate: 0.1,
            evolution_threshold: 0.7,
            memory_retention_days: 30,
        }
    }

    /// Set the capability list.
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set generation parameters.
    pub fn with_generation(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Set the learning rate.
    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Set the evolution threshold.
    pub fn with_evolution_threshold(mut self, threshold: f64) -> Self {
        self.evolution_threshold = threshold;
        self
    }

    /// Set the memory retention window.
    pub fn with_memory_retention_days(mut self, days: i64) -> Self {
        self.memory_retention_days = days;
        self
    }
}

// ============================================================================
// AGENT PHASE AND STATE
// ============================================================================

/// Task stamp carried while an agent is busy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTask {
    /// Task being executed
    pub task_id: TaskId,
    /// Task description at the time work started
    pub description: String,
    /// When the agent picked the task up
    pub started_at: Timestamp,
}

impl CurrentTask {
    /// Stamp a new current task with the present time.
    pub fn new(task_id: TaskId, description: &str) -> Self {
        Self {
            task_id,
            description: description.to_string(),
            started_at: Utc::now(),
        }
    }
}

/// What an agent is doing right now.
///
/// Status and current task are a single sum type, so an idle agent holding a
/// stale task stamp is unrepresentable. `Busy` carries the task; `Error`
/// carries the failure context (including the task that was in flight, if
/// any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentPhase {
    /// Available for work
    Idle,
    /// Executing a task
    Busy(CurrentTask),
    /// Applying learning strategies
    Learning,
    /// Undergoing evolution
    Evolving,
    /// Failed; holds the error message and the task in flight when it failed
    Error {
        message: String,
        task: Option<CurrentTask>,
    },
}

impl AgentPhase {
    /// Flat status view for metrics and events.
    pub fn status(&self) -> AgentStatus {
        match self {
            AgentPhase::Idle => AgentStatus::Idle,
            AgentPhase::Busy(_) => AgentStatus::Busy,
            AgentPhase::Learning => AgentStatus::Learning,
            AgentPhase::Evolving => AgentStatus::Evolving,
            AgentPhase::Error { .. } => AgentStatus::Error,
        }
    }

    /// Whether the agent can accept new work or enter learning/evolution.
    pub fn is_idle(&self) -> bool {
        matches!(self, AgentPhase::Idle)
    }
}

impl Default for AgentPhase {
    fn default() -> Self {
        AgentPhase::Idle
    }
}

/// Rolling performance metrics for a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Rolling success rate in [0, 1]
    pub success_rate: f64,
    /// 2-term moving response time in milliseconds
    pub average_response_time: f64,
    /// Total tokens consumed by generation calls
    pub token_usage: u64,
    /// Number of tasks completed
    pub task_completion: u64,
    /// Rolling user satisfaction in [0, 1]
    pub user_satisfaction: f64,
    /// When metrics were last updated
    pub last_updated: Timestamp,
}

impl AgentMetrics {
    /// Fresh metrics for a newly created agent.
    pub fn new() -> Self {
        Self {
            success_rate: 1.0,
            average_response_time: 0.0,
            token_usage: 0,
            task_completion: 0,
            user_satisfaction: 1.0,
            last_updated: Utc::now(),
        }
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable state owned exclusively by an agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Current phase (status + current task as one sum type)
    pub phase: AgentPhase,
    /// Three-part agent memory
    pub memory: AgentMemory,
    /// Rolling performance metrics
    pub metrics: AgentMetrics,
    /// Capability set (starts from config, mutable at runtime)
    pub capabilities: Vec<String>,
    /// Peer agent id -> relationship strength
    pub relationships: HashMap<AgentId, f64>,
}

impl AgentState {
    /// Initial state derived from a configuration.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            phase: AgentPhase::Idle,
            memory: AgentMemory::default(),
            metrics: AgentMetrics::new(),
            capabilities: config.capabilities.clone(),
            relationships: HashMap::new(),
        }
    }

    /// Check if the agent has a specific capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

// ============================================================================
// AGENT MEMORY
// ============================================================================

/// Outcome recorded with an experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceOutcome {
    /// Whether the underlying call succeeded
    pub success: bool,
    /// Result text on success
    pub result: Option<String>,
    /// Error message on failure
    pub error: Option<String>,
}

impl ExperienceOutcome {
    /// A successful outcome with its result text.
    pub fn success(result: &str) -> Self {
        Self {
            success: true,
            result: Some(result.to_string()),
            error: None,
        }
    }

    /// A failed outcome with its error message.
    pub fn failure(error: &str) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// One episode in an agent's episodic memory.
///
/// Immutable once created; removed only by retention cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Unique identifier
    pub experience_id: ExperienceId,
    /// When the experience happened
    pub timestamp: Timestamp,
    /// Context snapshot (the prompt or task the agent was working on)
    pub context: String,
    /// What happened
    pub outcome: ExperienceOutcome,
    /// Feedback score, clamped to [-1, 1]
    pub feedback: f64,
    /// Free-form tags
    pub tags: Vec<String>,
}

impl Experience {
    /// Create a new experience stamped with the present time.
    /// Feedback outside [-1, 1] is clamped.
    pub fn new(context: &str, outcome: ExperienceOutcome, feedback: f64) -> Self {
        Self {
            experience_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            context: context.to_string(),
            outcome,
            feedback: feedback.clamp(-1.0, 1.0),
            tags: Vec::new(),
        }
    }

    /// Attach tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A semantic memory entry (a learned fact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    /// Unique identifier
    pub knowledge_id: Uuid,
    /// What the knowledge is about
    pub subject: String,
    /// The knowledge content
    pub content: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// When it was learned
    pub learned_at: Timestamp,
}

impl Knowledge {
    /// Create a new knowledge entry.
    pub fn new(subject: &str, content: &str, confidence: f64) -> Self {
        Self {
            knowledge_id: Uuid::now_v7(),
            subject: subject.to_string(),
            content: content.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            learned_at: Utc::now(),
        }
    }
}

/// A procedural memory entry (a learned skill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Unique identifier
    pub skill_id: Uuid,
    /// Skill name
    pub name: String,
    /// What the skill does
    pub description: String,
    /// Proficiency in [0, 1]
    pub proficiency: f64,
    /// When the skill was acquired
    pub acquired_at: Timestamp,
}

impl Skill {
    /// Create a new skill entry.
    pub fn new(name: &str, description: &str, proficiency: f64) -> Self {
        Self {
            skill_id: Uuid::now_v7(),
            name: name.to_string(),
            description: description.to_string(),
            proficiency: proficiency.clamp(0.0, 1.0),
            acquired_at: Utc::now(),
        }
    }
}

/// Three-part agent memory: episodic, semantic, procedural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentMemory {
    /// Experiences keyed by id
    pub episodic: HashMap<ExperienceId, Experience>,
    /// Knowledge keyed by id
    pub semantic: HashMap<Uuid, Knowledge>,
    /// Skills keyed by id
    pub procedural: HashMap<Uuid, Skill>,
}

impl AgentMemory {
    /// Total number of entries across all three stores.
    pub fn len(&self) -> usize {
        self.episodic.len() + self.semantic.len() + self.procedural.len()
    }

    /// Whether all three stores are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// TASKS
// ============================================================================

/// A unit of work within a task's dependency DAG.
///
/// Dependencies reference sibling subtasks only. The graph must be acyclic;
/// readiness computation stalls (returns nothing) on a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique identifier
    pub subtask_id: SubTaskId,
    /// What this subtask does
    pub description: String,
    /// Capabilities an executor must have
    pub required_capabilities: Vec<String>,
    /// Sibling subtasks that must complete first
    pub dependencies: Vec<SubTaskId>,
    /// Current status
    pub status: TaskStatus,
    /// Result text once completed
    pub result: Option<String>,
}

impl SubTask {
    /// Create a new pending subtask.
    pub fn new(description: &str, required_capabilities: Vec<String>) -> Self {
        Self {
            subtask_id: Uuid::now_v7(),
            description: description.to_string(),
            required_capabilities,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            result: None,
        }
    }

    /// Set the dependency list.
    pub fn with_dependencies(mut self, dependencies: Vec<SubTaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// A task flowing through the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub task_id: TaskId,
    /// Free-text description of the work
    pub description: String,
    /// Decomposed subtasks (may be empty for flat tasks)
    pub subtasks: Vec<SubTask>,
    /// Priority
    pub priority: TaskPriority,
    /// Free-form task type (e.g. "chat_message")
    pub task_type: String,
    /// Current status
    pub status: TaskStatus,
    /// Result text once completed
    pub result: Option<String>,
    /// Error message once failed
    pub error: Option<String>,
    /// Candidate executor agents; the orchestrator invokes only the first
    pub assigned_agents: Vec<AgentId>,
    /// When the task was created
    pub created_at: Timestamp,
    /// When execution started
    pub started_at: Option<Timestamp>,
    /// When execution reached a terminal state
    pub completed_at: Option<Timestamp>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(description: &str, task_type: &str) -> Self {
        Self {
            task_id: Uuid::now_v7(),
            description: description.to_string(),
            subtasks: Vec::new(),
            priority: TaskPriority::Normal,
            task_type: task_type.to_string(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            assigned_agents: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Set the subtask list.
    pub fn with_subtasks(mut self, subtasks: Vec<SubTask>) -> Self {
        self.subtasks = subtasks;
        self
    }

    /// Set the candidate agents.
    pub fn with_agents(mut self, agents: Vec<AgentId>) -> Self {
        self.assigned_agents = agents;
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Look up a subtask by id.
    pub fn subtask(&self, subtask_id: SubTaskId) -> Option<&SubTask> {
        self.subtasks.iter().find(|s| s.subtask_id == subtask_id)
    }

    /// Mark the task started. No-op if the task already left `Pending`.
    pub fn mark_started(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::InProgress;
            self.started_at = Some(Utc::now());
        }
    }

    /// Mark the task completed with its result. No-op from a terminal state.
    pub fn mark_completed(&mut self, result: &str) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Completed;
            self.result = Some(result.to_string());
            self.completed_at = Some(Utc::now());
        }
    }

    /// Mark the task failed with its error. No-op from a terminal state.
    pub fn mark_failed(&mut self, error: &str) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Failed;
            self.error = Some(error.to_string());
            self.completed_at = Some(Utc::now());
        }
    }
}

// ============================================================================
// RESOURCES
// ============================================================================

/// Consumable resource amounts across the four budget dimensions.
///
/// Used both for pool usage/limits and for per-request requirements.
/// All dimensions are non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceUsage {
    /// Text-generation tokens
    pub tokens: u64,
    /// Abstract compute units
    pub compute_units: u64,
    /// Memory in bytes
    pub memory: u64,
    /// Storage in bytes
    pub storage: u64,
}

impl ResourceUsage {
    /// All dimensions zero.
    pub const ZERO: Self = Self {
        tokens: 0,
        compute_units: 0,
        memory: 0,
        storage: 0,
    };

    /// Construct from explicit amounts.
    pub const fn new(tokens: u64, compute_units: u64, memory: u64, storage: u64) -> Self {
        Self {
            tokens,
            compute_units,
            memory,
            storage,
        }
    }

    /// Component-wise sum.
    pub fn plus(&self, other: &ResourceUsage) -> ResourceUsage {
        ResourceUsage {
            tokens: self.tokens + other.tokens,
            compute_units: self.compute_units + other.compute_units,
            memory: self.memory + other.memory,
            storage: self.storage + other.storage,
        }
    }

    /// Component-wise difference, clamped at zero.
    pub fn minus_clamped(&self, other: &ResourceUsage) -> ResourceUsage {
        ResourceUsage {
            tokens: self.tokens.saturating_sub(other.tokens),
            compute_units: self.compute_units.saturating_sub(other.compute_units),
            memory: self.memory.saturating_sub(other.memory),
            storage: self.storage.saturating_sub(other.storage),
        }
    }

    /// Whether every dimension is within the given limit.
    pub fn within(&self, limit: &ResourceUsage) -> bool {
        self.tokens <= limit.tokens
            && self.compute_units <= limit.compute_units
            && self.memory <= limit.memory
            && self.storage <= limit.storage
    }

    /// Whether all dimensions are zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tokens={} compute={} memory={} storage={}",
            self.tokens, self.compute_units, self.memory, self.storage
        )
    }
}

// ============================================================================
// KNOWLEDGE GRAPH
// ============================================================================

/// A concept node in the weighted knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    /// Unique identifier
    pub node_id: ConceptId,
    /// Concept label
    pub concept: String,
    /// Outgoing weighted edges: target node id -> weight
    pub edges: HashMap<ConceptId, f64>,
    /// Agents that reference this concept
    pub referenced_by: HashSet<AgentId>,
    /// When the node was created
    pub created_at: Timestamp,
    /// When the node was last read
    pub last_accessed: Timestamp,
}

impl KnowledgeNode {
    /// Create a new node with no edges.
    pub fn new(concept: &str) -> Self {
        let now = Utc::now();
        Self {
            node_id: Uuid::now_v7(),
            concept: concept.to_string(),
            edges: HashMap::new(),
            referenced_by: HashSet::new(),
            created_at: now,
            last_accessed: now,
        }
    }

    /// Record an agent reference.
    pub fn add_reference(&mut self, agent_id: AgentId) {
        self.referenced_by.insert(agent_id);
    }
}

// ============================================================================
// SYSTEM METRICS AND REQUESTS
// ============================================================================

/// System-wide metrics derived from orchestrator events.
///
/// Derived, not authoritative: the collector folds lifecycle events into
/// these counters and never reaches into agent or task state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Number of active agents
    pub active_agents: u64,
    /// Number of tasks that reached a terminal state
    pub total_tasks: u64,
    /// Rolling success rate: rate = (rate * 9 + outcome) / 10
    pub success_rate: f64,
    /// Rolling average response time in milliseconds
    pub average_response_time: f64,
    /// Snapshot of current pool usage
    pub resource_usage: ResourceUsage,
    /// When the metrics were last updated
    pub last_updated: Timestamp,
}

impl SystemMetrics {
    /// Fresh metrics at system startup.
    pub fn new() -> Self {
        Self {
            active_agents: 0,
            total_tasks: 0,
            success_rate: 1.0,
            average_response_time: 0.0,
            resource_usage: ResourceUsage::ZERO,
            last_updated: Utc::now(),
        }
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// An abstract request entering the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRequest {
    /// Request type (e.g. "chat_message")
    pub request_type: String,
    /// Free-text request content
    pub content: String,
    /// Priority, defaulting to normal
    pub priority: TaskPriority,
}

impl UserRequest {
    /// Create a normal-priority request.
    pub fn new(request_type: &str, content: &str) -> Self {
        Self {
            request_type: request_type.to_string(),
            content: content.to_string(),
            priority: TaskPriority::Normal,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Result of a fully processed user request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResult {
    /// Task the request was executed as
    pub task_id: TaskId,
    /// Agent that executed it
    pub agent_id: AgentId,
    /// Generated output
    pub output: String,
}

/// Structured result of an evolution attempt.
///
/// Evolution never propagates errors: failures are contained here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionReport {
    /// Whether the evolution pipeline completed
    pub success: bool,
    /// Agent that was evolved
    pub agent_id: AgentId,
    /// Strategy that ran
    pub strategy: String,
    /// Performance issues that triggered the evolution
    pub issues: Vec<String>,
    /// Improvements from the generated plan
    pub improvements: Vec<String>,
    /// New capabilities from the generated plan
    pub new_capabilities: Vec<String>,
    /// Error message when the pipeline failed
    pub error: Option<String>,
}

impl EvolutionReport {
    /// A no-op success: evolution was not needed.
    pub fn skipped(agent_id: AgentId, strategy: &str) -> Self {
        Self {
            success: true,
            agent_id,
            strategy: strategy.to_string(),
            issues: Vec::new(),
            improvements: Vec::new(),
            new_capabilities: Vec::new(),
            error: None,
        }
    }

    /// A contained failure.
    pub fn failed(agent_id: AgentId, strategy: &str, error: &str) -> Self {
        Self {
            success: false,
            agent_id,
            strategy: strategy.to_string(),
            issues: Vec::new(),
            improvements: Vec::new(),
            new_capabilities: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
