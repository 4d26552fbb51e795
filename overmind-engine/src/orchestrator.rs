//! Active-agent and active-task coordination.
//!
//! The orchestrator exclusively owns the maps of live agent runtimes and
//! tasks. It creates and destroys agents, executes tasks against them, and
//! emits lifecycle events for every transition. After a successful task it
//! checks the executing agent's rolling success rate against that agent's
//! own evolution threshold and runs the evolution manager inline when the
//! agent has degraded, so completion latency includes evolution latency in
//! that case.

use overmind_agents::{AgentRuntime, EvolutionManager};
use overmind_core::{
    AgentConfig, AgentError, AgentId, AgentStatus, LifecycleEvent, OvermindResult, RequestResult,
    Task, TaskId,
};
use overmind_events::EventBus;
use overmind_llm::TextGeneration;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Owner of the active agent runtimes and tasks.
pub struct AgentOrchestrator {
    agents: HashMap<AgentId, AgentRuntime>,
    tasks: HashMap<TaskId, Task>,
    provider: Arc<dyn TextGeneration>,
    bus: Arc<EventBus>,
    evolution: EvolutionManager,
}

impl AgentOrchestrator {
    /// Create an orchestrator with no active agents or tasks.
    pub fn new(
        provider: Arc<dyn TextGeneration>,
        bus: Arc<EventBus>,
        evolution: EvolutionManager,
    ) -> Self {
        Self {
            agents: HashMap::new(),
            tasks: HashMap::new(),
            provider,
            bus,
            evolution,
        }
    }

    // ========================================================================
    // AGENT LIFECYCLE
    // ========================================================================

    /// Instantiate a runtime from a configuration and register it.
    pub fn create_agent(&mut self, config: AgentConfig) -> AgentId {
        let agent_id = config.agent_id;
        let name = config.name.clone();
        let runtime = AgentRuntime::new(config, self.provider.clone(), self.bus.clone());
        self.agents.insert(agent_id, runtime);
        info!(%agent_id, name, "agent created");
        self.bus
            .emit(LifecycleEvent::AgentCreated { agent_id, name });
        agent_id
    }

    /// Remove an agent from the active set.
    ///
    /// Does not cancel work already in flight on the agent.
    ///
    /// # Errors
    /// `AgentError::NotActive` if the agent is not registered.
    pub fn destroy_agent(&mut self, agent_id: AgentId) -> OvermindResult<()> {
        if self.agents.remove(&agent_id).is_none() {
            return Err(AgentError::NotActive { agent_id }.into());
        }
        info!(%agent_id, "agent destroyed");
        self.bus.emit(LifecycleEvent::AgentDestroyed { agent_id });
        Ok(())
    }

    /// Look up an active agent.
    pub fn agent(&self, agent_id: AgentId) -> Option<&AgentRuntime> {
        self.agents.get(&agent_id)
    }

    /// Mutable access to an active agent.
    pub fn agent_mut(&mut self, agent_id: AgentId) -> Option<&mut AgentRuntime> {
        self.agents.get_mut(&agent_id)
    }

    /// The first active agent holding the capability, if any.
    pub fn find_capable_agent(&self, capability: &str) -> Option<AgentId> {
        self.agents
            .values()
            .find(|agent| agent.has_capability(capability))
            .map(|agent| agent.id())
    }

    /// Number of active agents.
    pub fn active_agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Id, name, and status of every active agent.
    pub fn agent_summaries(&self) -> Vec<(AgentId, String, AgentStatus)> {
        self.agents
            .values()
            .map(|agent| {
                (
                    agent.id(),
                    agent.name().to_string(),
                    agent.state().phase.status(),
                )
            })
            .collect()
    }

    /// Look up a task by id.
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    // ========================================================================
    // TASK EXECUTION
    // ========================================================================

    /// Execute a task on its first assigned agent.
    ///
    /// A task may carry several candidate agents but only the first is ever
    /// invoked; the rest are spare capacity recorded for observability.
    ///
    /// # Errors
    /// - `AgentError::NoAgentAssigned` when the task has no agents
    /// - `AgentError::NotActive` when the assigned agent is not registered
    /// - Provider and runtime failures propagate after the task is marked
    ///   failed and `task_failed` is emitted
    pub fn execute_task(&mut self, mut task: Task) -> OvermindResult<RequestResult> {
        let task_id = task.task_id;
        let agent_id = *task
            .assigned_agents
            .first()
            .ok_or(AgentError::NoAgentAssigned { task_id })?;
        if !self.agents.contains_key(&agent_id) {
            return Err(AgentError::NotActive { agent_id }.into());
        }

        task.mark_started();
        self.bus
            .emit(LifecycleEvent::TaskStarted { task_id, agent_id });

        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(AgentError::NotActive { agent_id })?;
        match agent.process_task(&task) {
            Ok(output) => {
                task.mark_completed(&output);
                let duration_ms = task
                    .completed_at
                    .zip(task.started_at)
                    .map(|(end, start)| (end - start).num_milliseconds())
                    .unwrap_or(0);
                self.tasks.insert(task_id, task);
                self.bus.emit(LifecycleEvent::TaskCompleted {
                    task_id,
                    agent_id,
                    duration_ms,
                });

                if agent.metrics().success_rate < agent.config().evolution_threshold {
                    let report = self.evolution.evolve_agent(agent, "default");
                    info!(
                        %agent_id,
                        success = report.success,
                        improvements = report.improvements.len(),
                        "post-task evolution"
                    );
                }

                Ok(RequestResult {
                    task_id,
                    agent_id,
                    output,
                })
            }
            Err(err) => {
                let message = err.to_string();
                warn!(%task_id, %agent_id, error = %message, "task failed");
                task.mark_failed(&message);
                self.tasks.insert(task_id, task);
                self.bus.emit(LifecycleEvent::TaskFailed {
                    task_id,
                    agent_id,
                    error: message,
                });
                Err(err)
            }
        }
    }

    /// The evolution manager, for registering custom strategies.
    pub fn evolution_mut(&mut self) -> &mut EvolutionManager {
        &mut self.evolution
    }
}

impl std::fmt::Debug for AgentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOrchestrator")
            .field("agents", &self.agents.len())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use overmind_core::{EventKind, EvolutionThresholds, TaskStatus};
    use overmind_events::CollectingObserver;
    use overmind_llm::{MockTextProvider, ScriptedTextProvider};

    fn orchestrator_with(
        provider: Arc<dyn TextGeneration>,
    ) -> (AgentOrchestrator, Arc<CollectingObserver>) {
        let bus = Arc::new(EventBus::new());
        let observer = Arc::new(CollectingObserver::new());
        bus.subscribe(observer.clone());
        let evolution = EvolutionManager::new(provider.clone(), EvolutionThresholds::default());
        (AgentOrchestrator::new(provider, bus, evolution), observer)
    }

    fn helper_config() -> AgentConfig {
        AgentConfig::new("helper", "a helpful agent", "test-model")
            .with_capabilities(vec!["conversation".to_string()])
    }

    #[test]
    fn test_create_and_destroy_agent_emit_events() {
        let (mut orchestrator, observer) = orchestrator_with(Arc::new(MockTextProvider::new()));
        let agent_id = orchestrator.create_agent(helper_config());
        assert_eq!(orchestrator.active_agent_count(), 1);
        assert!(orchestrator.agent(agent_id).is_some());

        orchestrator.destroy_agent(agent_id).unwrap();
        assert_eq!(orchestrator.active_agent_count(), 0);
        assert_eq!(
            observer.kinds(),
            vec![EventKind::AgentCreated, EventKind::AgentDestroyed]
        );
    }

    #[test]
    fn test_destroy_unknown_agent_fails() {
        let (mut orchestrator, _) = orchestrator_with(Arc::new(MockTextProvider::new()));
        let err = orchestrator.destroy_agent(uuid::Uuid::now_v7()).unwrap_err();
        assert!(err.to_string().contains("not active"));
    }

    #[test]
    fn test_find_capable_agent() {
        let (mut orchestrator, _) = orchestrator_with(Arc::new(MockTextProvider::new()));
        let agent_id = orchestrator.create_agent(helper_config());
        assert_eq!(orchestrator.find_capable_agent("conversation"), Some(agent_id));
        assert_eq!(orchestrator.find_capable_agent("welding"), None);
    }

    #[test]
    fn test_execute_task_success_path() {
        let (mut orchestrator, observer) = orchestrator_with(Arc::new(MockTextProvider::new()));
        let agent_id = orchestrator.create_agent(helper_config());
        let task = Task::new("say hello", "chat_message").with_agents(vec![agent_id]);
        let task_id = task.task_id;

        let result = orchestrator.execute_task(task).unwrap();
        assert_eq!(result.agent_id, agent_id);
        assert!(result.output.contains("say hello"));

        let stored = orchestrator.task(task_id).unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert!(stored.started_at.is_some());
        assert!(stored.completed_at.is_some());
        assert!(observer.kinds().contains(&EventKind::TaskStarted));
        assert!(observer.kinds().contains(&EventKind::TaskCompleted));
        // Agent is idle again after the task.
        assert!(orchestrator.agent(agent_id).unwrap().state().phase.is_idle());
    }

    #[test]
    fn test_execute_task_without_agents_fails() {
        let (mut orchestrator, _) = orchestrator_with(Arc::new(MockTextProvider::new()));
        let err = orchestrator
            .execute_task(Task::new("orphan", "chat_message"))
            .unwrap_err();
        assert!(err.to_string().contains("no assigned agents"));
    }

    #[test]
    fn test_execute_task_only_first_agent_is_invoked() {
        let (mut orchestrator, _) = orchestrator_with(Arc::new(MockTextProvider::new()));
        let first = orchestrator.create_agent(helper_config());
        let second = orchestrator.create_agent(helper_config());
        let task = Task::new("work", "chat_message").with_agents(vec![first, second]);

        let result = orchestrator.execute_task(task).unwrap();
        assert_eq!(result.agent_id, first);
        assert_eq!(
            orchestrator.agent(second).unwrap().metrics().task_completion,
            0
        );
    }

    #[test]
    fn test_execute_task_failure_marks_and_emits() {
        let provider = Arc::new(ScriptedTextProvider::new());
        provider.push_err("quota exceeded");
        let (mut orchestrator, observer) = orchestrator_with(provider);
        let agent_id = orchestrator.create_agent(helper_config());
        let task = Task::new("doomed", "chat_message").with_agents(vec![agent_id]);
        let task_id = task.task_id;

        let err = orchestrator.execute_task(task).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        let stored = orchestrator.task(task_id).unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert!(observer.kinds().contains(&EventKind::TaskFailed));
    }

    #[test]
    fn test_degraded_agent_evolves_after_success() {
        let provider = Arc::new(ScriptedTextProvider::new());
        // Four failures drive the rolling rate from 1.0 down to 0.6561.
        for _ in 0..4 {
            provider.push_err("provider down");
        }
        provider.push_ok("task output");
        // Improvement plan for the evolution pipeline triggered post-task.
        provider.push_ok(r#"{"improvements": ["focus"], "new_capabilities": []}"#);
        let (mut orchestrator, observer) = orchestrator_with(provider);
        let agent_id = orchestrator.create_agent(helper_config());

        for _ in 0..4 {
            let task = Task::new("doomed", "chat_message").with_agents(vec![agent_id]);
            assert!(orchestrator.execute_task(task).is_err());
            orchestrator.agent_mut(agent_id).unwrap().reset_error();
        }

        // Success folds the rate to (0.6561 * 9 + 1) / 10 = 0.69049, still
        // below the agent's 0.7 evolution threshold.
        let task = Task::new("work", "chat_message").with_agents(vec![agent_id]);
        orchestrator.execute_task(task).unwrap();

        assert!(observer.kinds().contains(&EventKind::EvolutionStarted));
        assert!(observer.kinds().contains(&EventKind::EvolutionCompleted));
    }
}
