//! Agent runtime: phase machine, memory, metrics, and the generation boundary.

use chrono::{Duration, Utc};
use crate::evolution::EvolutionManager;
use overmind_core::{
    new_entity_id, AgentConfig, AgentError, AgentId, AgentMemory, AgentMetrics, AgentPhase,
    AgentState, CurrentTask, EvolutionReport, Experience, ExperienceOutcome, LifecycleEvent,
    OvermindError, OvermindResult, Task,
};
use overmind_events::EventBus;
use overmind_llm::{ChatMessage, ChatRole, GenerationParams, TextGeneration};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

// ============================================================================
// MEMORY RETRIEVAL
// ============================================================================

/// Extension point for retrieving relevant memories before generation.
///
/// The returned experiences are formatted into the prompt as extra context.
pub trait MemoryRetrieval: Send + Sync {
    /// Retrieve experiences relevant to the query.
    fn retrieve(&self, memory: &AgentMemory, query: &str) -> Vec<Experience>;
}

/// Default retrieval: returns nothing.
#[derive(Debug, Clone, Default)]
pub struct NoRetrieval;

impl MemoryRetrieval for NoRetrieval {
    fn retrieve(&self, _memory: &AgentMemory, _query: &str) -> Vec<Experience> {
        Vec::new()
    }
}

// ============================================================================
// LEARNING STRATEGIES
// ============================================================================

/// A pluggable learning strategy, applied in registration order by `learn`.
pub trait LearningStrategy: Send + Sync {
    /// Strategy name, used in error reports.
    fn name(&self) -> &str;

    /// Apply the experience to the agent's state.
    fn apply(
        &self,
        state: &mut AgentState,
        experience: &Experience,
        learning_rate: f64,
    ) -> OvermindResult<()>;
}

/// Folds experience feedback into the rolling user-satisfaction metric.
///
/// Feedback in [-1, 1] is rescaled to [0, 1] and blended in at the agent's
/// learning rate.
#[derive(Debug, Clone, Default)]
pub struct SatisfactionLearning;

impl LearningStrategy for SatisfactionLearning {
    fn name(&self) -> &str {
        "satisfaction"
    }

    fn apply(
        &self,
        state: &mut AgentState,
        experience: &Experience,
        learning_rate: f64,
    ) -> OvermindResult<()> {
        let signal = (experience.feedback + 1.0) / 2.0;
        let satisfaction = &mut state.metrics.user_satisfaction;
        *satisfaction = *satisfaction * (1.0 - learning_rate) + signal * learning_rate;
        state.metrics.last_updated = Utc::now();
        Ok(())
    }
}

// ============================================================================
// AGENT RUNTIME
// ============================================================================

/// A single agent instance: immutable configuration, exclusively owned
/// mutable state, and the text-generation call boundary.
pub struct AgentRuntime {
    config: AgentConfig,
    state: AgentState,
    provider: Arc<dyn TextGeneration>,
    bus: Arc<EventBus>,
    retrieval: Box<dyn MemoryRetrieval>,
    learning: Vec<Box<dyn LearningStrategy>>,
}

impl AgentRuntime {
    /// Create a runtime from its configuration.
    pub fn new(config: AgentConfig, provider: Arc<dyn TextGeneration>, bus: Arc<EventBus>) -> Self {
        let state = AgentState::from_config(&config);
        Self {
            config,
            state,
            provider,
            bus,
            retrieval: Box::new(NoRetrieval),
            learning: Vec::new(),
        }
    }

    /// Replace the memory-retrieval strategy.
    pub fn with_retrieval(mut self, retrieval: Box<dyn MemoryRetrieval>) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Register a learning strategy. Strategies run in registration order.
    pub fn add_learning_strategy(&mut self, strategy: Box<dyn LearningStrategy>) {
        self.learning.push(strategy);
    }

    /// This agent's id.
    pub fn id(&self) -> AgentId {
        self.config.agent_id
    }

    /// This agent's name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Immutable configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current state (phase, memory, metrics, capabilities).
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Current metrics.
    pub fn metrics(&self) -> &AgentMetrics {
        &self.state.metrics
    }

    pub(crate) fn state_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }

    pub(crate) fn set_phase(&mut self, phase: AgentPhase) {
        self.state.phase = phase;
    }

    pub(crate) fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Check a capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.state.has_capability(capability)
    }

    /// Add a capability if not already present.
    pub fn add_capability(&mut self, capability: &str) {
        if !self.state.has_capability(capability) {
            self.state.capabilities.push(capability.to_string());
        }
    }

    /// Remove a capability if present.
    pub fn remove_capability(&mut self, capability: &str) {
        self.state.capabilities.retain(|c| c != capability);
    }

    /// Clear an error phase so the agent can accept work again.
    /// No-op unless the agent is in the error phase.
    pub fn reset_error(&mut self) {
        if matches!(self.state.phase, AgentPhase::Error { .. }) {
            self.state.phase = AgentPhase::Idle;
        }
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// Generate a completion for the conversation.
    ///
    /// Retrieves relevant memories, augments the system prompt with a
    /// formatted memory context, and invokes the provider with the
    /// configured model, temperature, and output size. Every call records an
    /// Experience. The average response time is updated with the 2-term
    /// moving value `new_avg = (old_avg + latency) / 2` - deliberately not a
    /// true exponential or windowed average.
    ///
    /// On provider failure the call records a failed Experience, emits an
    /// error event, and propagates the error.
    pub fn generate_response(
        &mut self,
        messages: &[ChatMessage],
        system_prompt: &str,
    ) -> OvermindResult<String> {
        let query = last_user_content(messages);
        let memories = self.retrieval.retrieve(&self.state.memory, &query);
        let prompt = augment_prompt(system_prompt, &memories);
        let params = GenerationParams::new(
            &self.config.model,
            self.config.temperature,
            self.config.max_tokens,
        );

        let started = Instant::now();
        match self.provider.generate(messages, &prompt, &params) {
            Ok(text) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let metrics = &mut self.state.metrics;
                metrics.average_response_time =
                    (metrics.average_response_time + latency_ms) / 2.0;
                // Rough 4-chars-per-token estimate; providers that report
                // usage can feed exact numbers through a learning strategy.
                metrics.token_usage += (text.len() / 4) as u64;
                metrics.last_updated = Utc::now();

                self.record_experience(Experience::new(
                    &query,
                    ExperienceOutcome::success(&text),
                    0.0,
                ));
                debug!(agent_id = %self.id(), latency_ms, "generation completed");
                Ok(text)
            }
            Err(err) => {
                let message = err.to_string();
                self.record_experience(Experience::new(
                    &query,
                    ExperienceOutcome::failure(&message),
                    -1.0,
                ));
                error!(agent_id = %self.id(), error = %message, "generation failed");
                self.bus.emit(LifecycleEvent::Error {
                    agent_id: Some(self.id()),
                    message,
                });
                Err(err)
            }
        }
    }

    /// Execute a conversation as a unit of work.
    ///
    /// Transitions idle -> busy (with a task stamp) -> idle, generating with
    /// a persona system prompt derived from the agent's name and description.
    /// On failure the agent enters the error phase carrying the task that was
    /// in flight.
    pub fn process_conversation(&mut self, conversation: &[ChatMessage]) -> OvermindResult<String> {
        let stamp = CurrentTask::new(new_entity_id(), &last_user_content(conversation));
        self.process_with_stamp(conversation, stamp)
    }

    /// Execute an orchestrated task, stamping its real id.
    pub fn process_task(&mut self, task: &Task) -> OvermindResult<String> {
        let stamp = CurrentTask::new(task.task_id, &task.description);
        let conversation = vec![ChatMessage::user(&task.description)];
        self.process_with_stamp(&conversation, stamp)
    }

    fn process_with_stamp(
        &mut self,
        conversation: &[ChatMessage],
        stamp: CurrentTask,
    ) -> OvermindResult<String> {
        self.ensure_idle()?;
        self.state.phase = AgentPhase::Busy(stamp.clone());

        let persona = format!("You are {}. {}", self.config.name, self.config.description);
        match self.generate_response(conversation, &persona) {
            Ok(text) => {
                self.fold_success(true);
                self.state.phase = AgentPhase::Idle;
                Ok(text)
            }
            Err(err) => {
                self.fold_success(false);
                self.state.phase = AgentPhase::Error {
                    message: err.to_string(),
                    task: Some(stamp),
                };
                Err(err)
            }
        }
    }

    /// Fold a task outcome into the rolling success rate:
    /// `rate = (rate * 9 + outcome) / 10`.
    fn fold_success(&mut self, success: bool) {
        let outcome = if success { 1.0 } else { 0.0 };
        let metrics = &mut self.state.metrics;
        metrics.success_rate = (metrics.success_rate * 9.0 + outcome) / 10.0;
        if success {
            metrics.task_completion += 1;
        }
        metrics.last_updated = Utc::now();
    }

    // ------------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------------

    /// Record an experience into episodic memory.
    ///
    /// Entries strictly older than the retention window are purged first.
    /// An entry aged exactly the window is kept.
    pub fn record_experience(&mut self, experience: Experience) {
        let cutoff = Utc::now() - Duration::days(self.config.memory_retention_days);
        self.state
            .memory
            .episodic
            .retain(|_, e| e.timestamp >= cutoff);
        self.state
            .memory
            .episodic
            .insert(experience.experience_id, experience);
    }

    // ------------------------------------------------------------------------
    // Learning
    // ------------------------------------------------------------------------

    /// Apply every registered learning strategy to the experience, in
    /// registration order. The phase is restored to idle even when a
    /// strategy fails.
    pub fn learn(&mut self, experience: &Experience) -> OvermindResult<()> {
        self.ensure_idle()?;
        self.state.phase = AgentPhase::Learning;
        self.bus
            .emit(LifecycleEvent::LearningStarted { agent_id: self.id() });

        let learning_rate = self.config.learning_rate;
        let mut result = Ok(());
        for strategy in &self.learning {
            if let Err(err) = strategy.apply(&mut self.state, experience, learning_rate) {
                result = Err(OvermindError::Agent(AgentError::LearningFailed {
                    agent_id: self.config.agent_id,
                    strategy: strategy.name().to_string(),
                    reason: err.to_string(),
                }));
                break;
            }
        }

        // Guaranteed restoration, success or not.
        self.state.phase = AgentPhase::Idle;
        self.bus
            .emit(LifecycleEvent::LearningCompleted { agent_id: self.id() });
        result
    }

    // ------------------------------------------------------------------------
    // Evolution
    // ------------------------------------------------------------------------

    /// Run every registered evolution strategy against this agent.
    ///
    /// Proceeds only when the rolling success rate has fallen below the
    /// configured threshold; otherwise returns an empty list. Each strategy
    /// is additionally gated by its own `should_evolve` predicate inside the
    /// manager, and failures are contained in the returned reports.
    pub fn evolve(&mut self, manager: &EvolutionManager) -> Vec<EvolutionReport> {
        if self.state.metrics.success_rate >= self.config.evolution_threshold {
            return Vec::new();
        }
        let names: Vec<String> = manager
            .strategy_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        names
            .iter()
            .map(|name| manager.evolve_agent(self, name))
            .collect()
    }

    fn ensure_idle(&self) -> OvermindResult<()> {
        if self.state.phase.is_idle() {
            Ok(())
        } else {
            Err(OvermindError::Agent(AgentError::NotIdle {
                agent_id: self.config.agent_id,
                phase: self.state.phase.status().to_string(),
            }))
        }
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("agent_id", &self.config.agent_id)
            .field("name", &self.config.name)
            .field("phase", &self.state.phase.status())
            .finish()
    }
}

fn last_user_content(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn augment_prompt(system_prompt: &str, memories: &[Experience]) -> String {
    if memories.is_empty() {
        return system_prompt.to_string();
    }
    let mut prompt = String::from(system_prompt);
    prompt.push_str("\n\nRelevant past experience:");
    for memory in memories {
        let outcome = if memory.outcome.success { "ok" } else { "failed" };
        prompt.push_str(&format!("\n- [{}] {}", outcome, memory.context));
    }
    prompt
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use overmind_core::AgentStatus;
    use overmind_core::EventKind;
    use overmind_events::CollectingObserver;
    use overmind_llm::{MockTextProvider, ScriptedTextProvider};

    fn test_config() -> AgentConfig {
        AgentConfig::new("helper", "a helpful test agent", "test-model")
            .with_capabilities(vec!["conversation".to_string()])
    }

    fn runtime_with(provider: Arc<dyn TextGeneration>) -> (AgentRuntime, Arc<CollectingObserver>) {
        let bus = Arc::new(EventBus::new());
        let collector = Arc::new(CollectingObserver::new());
        bus.subscribe(collector.clone());
        (AgentRuntime::new(test_config(), provider, bus), collector)
    }

    #[test]
    fn test_generate_response_records_experience() {
        let (mut agent, _) = runtime_with(Arc::new(MockTextProvider::new()));
        let reply = agent
            .generate_response(&[ChatMessage::user("hello")], "be nice")
            .unwrap();
        assert!(reply.contains("hello"));
        assert_eq!(agent.state().memory.episodic.len(), 1);
        let experience = agent.state().memory.episodic.values().next().unwrap();
        assert!(experience.outcome.success);
        assert_eq!(experience.context, "hello");
    }

    #[test]
    fn test_generate_response_failure_records_and_emits() {
        let provider = Arc::new(ScriptedTextProvider::new());
        provider.push_err("quota exceeded");
        let (mut agent, collector) = runtime_with(provider);

        let err = agent
            .generate_response(&[ChatMessage::user("hello")], "sys")
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));

        assert_eq!(agent.state().memory.episodic.len(), 1);
        let experience = agent.state().memory.episodic.values().next().unwrap();
        assert!(!experience.outcome.success);
        assert_eq!(experience.feedback, -1.0);

        assert_eq!(collector.count_of(EventKind::Error), 1);
    }

    #[test]
    fn test_average_response_time_two_term_formula() {
        let (mut agent, _) = runtime_with(Arc::new(MockTextProvider::new()));
        assert_eq!(agent.metrics().average_response_time, 0.0);
        agent
            .generate_response(&[ChatMessage::user("a")], "sys")
            .unwrap();
        let after_one = agent.metrics().average_response_time;
        // new_avg = (0 + latency) / 2, so latency was 2 * after_one.
        assert!(after_one >= 0.0);
        agent
            .generate_response(&[ChatMessage::user("b")], "sys")
            .unwrap();
        let after_two = agent.metrics().average_response_time;
        // Each step halves the previous contribution.
        assert!(after_two >= after_one / 2.0);
    }

    #[test]
    fn test_process_conversation_phases() {
        let (mut agent, _) = runtime_with(Arc::new(MockTextProvider::new()));
        assert!(agent.state().phase.is_idle());
        let reply = agent
            .process_conversation(&[ChatMessage::user("do the thing")])
            .unwrap();
        assert!(reply.contains("do the thing"));
        assert!(agent.state().phase.is_idle());
        assert_eq!(agent.metrics().task_completion, 1);
    }

    #[test]
    fn test_process_conversation_failure_keeps_task_in_error_phase() {
        let provider = Arc::new(ScriptedTextProvider::new());
        provider.push_err("boom");
        let (mut agent, _) = runtime_with(provider);

        let err = agent
            .process_conversation(&[ChatMessage::user("work")])
            .unwrap_err();
        assert!(err.to_string().contains("boom"));

        match &agent.state().phase {
            AgentPhase::Error { message, task } => {
                assert!(message.contains("boom"));
                let task = task.as_ref().expect("failed task stamp retained");
                assert_eq!(task.description, "work");
            }
            other => panic!("expected error phase, got {:?}", other.status()),
        }

        // Busy agent (error phase) refuses new work until reset.
        assert!(agent
            .process_conversation(&[ChatMessage::user("again")])
            .is_err());
        agent.reset_error();
        assert!(agent.state().phase.is_idle());
    }

    #[test]
    fn test_success_rate_folds_rolling() {
        let provider = Arc::new(ScriptedTextProvider::new());
        provider.push_err("one");
        provider.push_err("two");
        provider.push_err("three");
        let (mut agent, _) = runtime_with(provider);

        let mut expected = 1.0;
        for _ in 0..3 {
            let _ = agent.process_conversation(&[ChatMessage::user("x")]);
            agent.reset_error();
            expected = expected * 9.0 / 10.0;
            assert!((agent.metrics().success_rate - expected).abs() < 1e-12);
        }
        assert!((agent.metrics().success_rate - 0.729).abs() < 1e-12);
    }

    #[test]
    fn test_retention_purges_old_experiences() {
        let (mut agent, _) = runtime_with(Arc::new(MockTextProvider::new()));

        let mut stale = Experience::new("old context", ExperienceOutcome::success("r"), 0.0);
        stale.timestamp = Utc::now() - Duration::days(31);
        let stale_id = stale.experience_id;
        agent.state_mut().memory.episodic.insert(stale_id, stale);

        // Exactly-at-boundary entry stays (retention is 30 days).
        let mut boundary = Experience::new("boundary", ExperienceOutcome::success("r"), 0.0);
        boundary.timestamp = Utc::now() - Duration::days(30) + Duration::seconds(1);
        let boundary_id = boundary.experience_id;
        agent
            .state_mut()
            .memory
            .episodic
            .insert(boundary_id, boundary);

        agent.record_experience(Experience::new(
            "fresh",
            ExperienceOutcome::success("r"),
            0.0,
        ));

        assert!(!agent.state().memory.episodic.contains_key(&stale_id));
        assert!(agent.state().memory.episodic.contains_key(&boundary_id));
        assert_eq!(agent.state().memory.episodic.len(), 2);
    }

    #[test]
    fn test_learn_applies_strategies_and_restores_phase() {
        let (mut agent, collector) = runtime_with(Arc::new(MockTextProvider::new()));
        agent.add_learning_strategy(Box::new(SatisfactionLearning));

        let before = agent.metrics().user_satisfaction;
        let experience = Experience::new("ctx", ExperienceOutcome::failure("bad"), -1.0);
        agent.learn(&experience).unwrap();

        assert!(agent.metrics().user_satisfaction < before);
        assert!(agent.state().phase.is_idle());
        assert_eq!(collector.count_of(EventKind::LearningStarted), 1);
        assert_eq!(collector.count_of(EventKind::LearningCompleted), 1);
    }

    #[test]
    fn test_learn_restores_phase_on_strategy_failure() {
        struct FailingStrategy;
        impl LearningStrategy for FailingStrategy {
            fn name(&self) -> &str {
                "failing"
            }
            fn apply(
                &self,
                _state: &mut AgentState,
                _experience: &Experience,
                _learning_rate: f64,
            ) -> OvermindResult<()> {
                Err(OvermindError::Agent(AgentError::NotActive {
                    agent_id: uuid::Uuid::nil(),
                }))
            }
        }

        let (mut agent, collector) = runtime_with(Arc::new(MockTextProvider::new()));
        agent.add_learning_strategy(Box::new(FailingStrategy));

        let experience = Experience::new("ctx", ExperienceOutcome::success("ok"), 0.5);
        let err = agent.learn(&experience).unwrap_err();
        assert!(err.to_string().contains("failing"));
        assert!(agent.state().phase.is_idle());
        assert_eq!(collector.count_of(EventKind::LearningCompleted), 1);
    }

    #[test]
    fn test_capability_mutation() {
        let (mut agent, _) = runtime_with(Arc::new(MockTextProvider::new()));
        assert!(agent.has_capability("conversation"));
        agent.add_capability("analysis");
        agent.add_capability("analysis");
        assert_eq!(
            agent
                .state()
                .capabilities
                .iter()
                .filter(|c| *c == "analysis")
                .count(),
            1
        );
        agent.remove_capability("conversation");
        assert!(!agent.has_capability("conversation"));
    }

    #[test]
    fn test_memory_augmented_prompt() {
        struct AllEpisodic;
        impl MemoryRetrieval for AllEpisodic {
            fn retrieve(&self, memory: &AgentMemory, _query: &str) -> Vec<Experience> {
                memory.episodic.values().cloned().collect()
            }
        }

        let prompt = augment_prompt("base prompt", &[]);
        assert_eq!(prompt, "base prompt");

        let memories = vec![Experience::new(
            "past question",
            ExperienceOutcome::success("answer"),
            0.0,
        )];
        let prompt = augment_prompt("base prompt", &memories);
        assert!(prompt.starts_with("base prompt"));
        assert!(prompt.contains("Relevant past experience"));
        assert!(prompt.contains("past question"));

        // Wire the retrieval through a runtime to make sure it is exercised.
        let bus = Arc::new(EventBus::new());
        let mut agent = AgentRuntime::new(
            test_config(),
            Arc::new(MockTextProvider::new()),
            bus,
        )
        .with_retrieval(Box::new(AllEpisodic));
        agent
            .generate_response(&[ChatMessage::user("first")], "sys")
            .unwrap();
        agent
            .generate_response(&[ChatMessage::user("second")], "sys")
            .unwrap();
        assert_eq!(agent.state().memory.episodic.len(), 2);
    }

    #[test]
    fn test_evolve_gated_on_own_threshold() {
        use overmind_core::EvolutionThresholds;

        let provider = Arc::new(ScriptedTextProvider::new());
        let (mut agent, _) = runtime_with(provider.clone());
        let manager = EvolutionManager::new(provider.clone(), EvolutionThresholds::default());

        // Healthy agent: the runtime-level gate short-circuits entirely.
        assert!(agent.evolve(&manager).is_empty());

        agent.state_mut().metrics.success_rate = 0.4;
        provider.push_ok(r#"{"improvements": ["slow down"], "new_capabilities": []}"#);
        let reports = agent.evolve(&manager);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].success);
        assert!(agent.state().phase.is_idle());
    }

    #[test]
    fn test_status_view_matches_phase() {
        let (agent, _) = runtime_with(Arc::new(MockTextProvider::new()));
        assert_eq!(agent.state().phase.status(), AgentStatus::Idle);
    }
}
