//! The node facade: single entry point for the whole engine.
//!
//! `GodNode` wires the pool, blueprint registry, orchestrator, knowledge
//! graph, and providers together once at construction and runs the request
//! pipeline:
//! capability analysis, agent acquisition, resource admission, task
//! execution, knowledge update, resource release. System metrics are derived
//! by folding lifecycle events, never by reaching into agent or task state.

use chrono::Utc;
use crate::{AgentOrchestrator, KnowledgeGraph, ResourcePool};
use overmind_agents::{AgentRegistry, EvolutionManager};
use overmind_core::{
    AgentId, AgentStatus, EventEnvelope, LifecycleEvent, OvermindConfig, OvermindError,
    OvermindResult, RequestResult, ResourceError, SystemMetrics, Task, UserRequest,
};
use overmind_events::{EventBus, EventObserver};
use overmind_llm::{CapabilityClassifier, ProviderRegistry};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// ============================================================================
// SYSTEM METRICS COLLECTOR
// ============================================================================

/// Folds lifecycle events into system-wide metrics.
///
/// Agent created/destroyed adjust the active count; terminal task events
/// bump the task counter and fold the rolling success rate with
/// `rate = (rate * 9 + outcome) / 10`. Completed tasks also fold their
/// duration into the rolling response-time average,
/// `avg = (avg + duration) / 2`.
#[derive(Debug, Default)]
pub struct SystemMetricsCollector {
    inner: Mutex<SystemMetrics>,
}

impl SystemMetricsCollector {
    /// Create a collector with fresh metrics.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SystemMetrics::new()),
        }
    }

    /// Snapshot of the current metrics.
    pub fn snapshot(&self) -> SystemMetrics {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventObserver for SystemMetricsCollector {
    fn on_event(&self, envelope: &EventEnvelope) {
        let mut metrics = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &envelope.event {
            LifecycleEvent::AgentCreated { .. } => metrics.active_agents += 1,
            LifecycleEvent::AgentDestroyed { .. } => {
                metrics.active_agents = metrics.active_agents.saturating_sub(1);
            }
            LifecycleEvent::TaskCompleted { duration_ms, .. } => {
                metrics.total_tasks += 1;
                metrics.success_rate = (metrics.success_rate * 9.0 + 1.0) / 10.0;
                metrics.average_response_time =
                    (metrics.average_response_time + *duration_ms as f64) / 2.0;
            }
            LifecycleEvent::TaskFailed { .. } => {
                metrics.total_tasks += 1;
                metrics.success_rate = (metrics.success_rate * 9.0) / 10.0;
            }
            _ => return,
        }
        metrics.last_updated = Utc::now();
    }
}

// ============================================================================
// NODE FACADE
// ============================================================================

/// Top-level coordinator owning every engine subsystem.
///
/// Constructed once during startup; all collaborators are passed in
/// explicitly, so there is no global state and tests can build isolated
/// nodes freely.
pub struct GodNode {
    config: OvermindConfig,
    pool: ResourcePool,
    registry: AgentRegistry,
    orchestrator: AgentOrchestrator,
    knowledge: KnowledgeGraph,
    classifier: Arc<dyn CapabilityClassifier>,
    bus: Arc<EventBus>,
    collector: Arc<SystemMetricsCollector>,
}

impl GodNode {
    /// Wire up a node from a configuration and registered providers.
    ///
    /// # Errors
    /// `LlmError::ProviderNotConfigured` when the text provider or the
    /// classifier is missing from the registry.
    pub fn new(config: OvermindConfig, providers: &ProviderRegistry) -> OvermindResult<Self> {
        let text = providers.text()?;
        let classifier = providers.classifier()?;

        let bus = Arc::new(EventBus::new());
        let collector = Arc::new(SystemMetricsCollector::new());
        bus.subscribe(collector.clone());

        let evolution = EvolutionManager::new(text.clone(), config.evolution.clone());
        let orchestrator = AgentOrchestrator::new(text, bus.clone(), evolution);
        let pool = ResourcePool::new(config.resource_limits);

        info!(limits = %config.resource_limits, "node initialized");
        Ok(Self {
            config,
            pool,
            registry: AgentRegistry::new(),
            orchestrator,
            knowledge: KnowledgeGraph::new(),
            classifier,
            bus,
            collector,
        })
    }

    /// Run the full request pipeline.
    ///
    /// Resources allocated for the request are released whether execution
    /// succeeds or fails.
    ///
    /// # Errors
    /// - `ResourceError::Insufficient` when admission control rejects the
    ///   request; nothing has run at that point
    /// - Task execution failures propagate after resource release
    pub fn process_user_request(&mut self, request: &UserRequest) -> OvermindResult<RequestResult> {
        let capabilities = self.analyze_request(&request.content);
        let agent_ids: Vec<AgentId> = capabilities
            .iter()
            .map(|capability| self.acquire_agent(capability))
            .collect();

        let requirements = self.config.request_costs.estimate(request.content.len());
        if !self.pool.allocate(&requirements) {
            return Err(OvermindError::Resource(ResourceError::Insufficient {
                requested: requirements,
                available: self.pool.available(),
            }));
        }

        let task = Task::new(&request.content, &request.request_type)
            .with_priority(request.priority)
            .with_agents(agent_ids);
        let result = self.orchestrator.execute_task(task);

        if let Ok(result) = &result {
            self.record_learning(&capabilities, result.agent_id);
        }
        self.pool.release(&requirements);
        result
    }

    /// Classify the request into required capabilities.
    ///
    /// Classifier failures and empty classifications degrade to the
    /// configured default capability rather than failing the request.
    fn analyze_request(&self, content: &str) -> Vec<String> {
        match self.classifier.classify(content) {
            Ok(capabilities) if !capabilities.is_empty() => capabilities,
            Ok(_) => vec![self.config.default_capability.clone()],
            Err(err) => {
                warn!(error = %err, "capability analysis failed, using default capability");
                vec![self.config.default_capability.clone()]
            }
        }
    }

    /// Reuse an existing capable agent, instantiate a registered blueprint
    /// covering the capability, or fall back to the default template.
    ///
    /// When several blueprints cover the capability the lexicographically
    /// smallest name wins, so acquisition is deterministic.
    fn acquire_agent(&mut self, capability: &str) -> AgentId {
        if let Some(agent_id) = self.orchestrator.find_capable_agent(capability) {
            return agent_id;
        }
        let config = match self
            .registry
            .find_by_capability(capability)
            .into_iter()
            .min_by(|a, b| a.name.cmp(&b.name))
        {
            Some(entry) => entry.instantiate(),
            None => self.config.agent_defaults.config_for_capability(capability),
        };
        self.orchestrator.create_agent(config)
    }

    /// Fold the served request into the knowledge graph.
    fn record_learning(&mut self, capabilities: &[String], agent_id: AgentId) {
        let mut previous = None;
        for capability in capabilities {
            let node_id = self.knowledge.ensure_concept(capability);
            self.knowledge.record_reference(node_id, agent_id);
            if let Some(previous) = previous {
                self.knowledge.add_edge(previous, node_id, 0.6);
            }
            previous = Some(node_id);
        }
    }

    /// System metrics with a live resource-usage snapshot.
    pub fn metrics(&self) -> SystemMetrics {
        let mut metrics = self.collector.snapshot();
        metrics.resource_usage = self.pool.current_usage();
        metrics
    }

    /// Id, name, and status of every active agent.
    pub fn agents(&self) -> Vec<(AgentId, String, AgentStatus)> {
        self.orchestrator.agent_summaries()
    }

    /// The event bus, for subscribing external observers.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The blueprint registry.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// The blueprint registry, for registering agent templates.
    pub fn registry_mut(&mut self) -> &mut AgentRegistry {
        &mut self.registry
    }

    /// The orchestrator, for direct agent and task management.
    pub fn orchestrator_mut(&mut self) -> &mut AgentOrchestrator {
        &mut self.orchestrator
    }

    /// The knowledge graph.
    pub fn knowledge_mut(&mut self) -> &mut KnowledgeGraph {
        &mut self.knowledge
    }

    /// The resource pool.
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// The active configuration.
    pub fn config(&self) -> &OvermindConfig {
        &self.config
    }
}

impl std::fmt::Debug for GodNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GodNode")
            .field("agents", &self.orchestrator.active_agent_count())
            .field("usage", &self.pool.current_usage())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use overmind_core::{EventKind, ResourceUsage};
    use overmind_llm::{MockClassifier, MockTextProvider};
    use uuid::Uuid;

    fn test_providers() -> ProviderRegistry {
        let mut providers = ProviderRegistry::new();
        providers.register_text(Arc::new(MockTextProvider::new()));
        providers.register_classifier(Arc::new(MockClassifier::new(vec![
            "conversation".to_string(),
        ])));
        providers
    }

    #[test]
    fn test_node_requires_providers() {
        let err = GodNode::new(OvermindConfig::standard(), &ProviderRegistry::new());
        assert!(err.is_err());
    }

    #[test]
    fn test_collector_rolls_success_rate() {
        let collector = SystemMetricsCollector::new();
        let agent_id = Uuid::now_v7();
        for _ in 0..3 {
            collector.on_event(&EventEnvelope::new(LifecycleEvent::TaskFailed {
                task_id: Uuid::now_v7(),
                agent_id,
                error: "boom".to_string(),
            }));
        }
        let metrics = collector.snapshot();
        assert_eq!(metrics.total_tasks, 3);
        // 1.0 -> 0.9 -> 0.81 -> 0.729
        assert!((metrics.success_rate - 0.729).abs() < 1e-9);
    }

    #[test]
    fn test_collector_folds_response_time() {
        let collector = SystemMetricsCollector::new();
        let agent_id = Uuid::now_v7();
        for duration_ms in [100, 300] {
            collector.on_event(&EventEnvelope::new(LifecycleEvent::TaskCompleted {
                task_id: Uuid::now_v7(),
                agent_id,
                duration_ms,
            }));
        }
        // 0.0 -> 50.0 -> 175.0
        let metrics = collector.snapshot();
        assert!((metrics.average_response_time - 175.0).abs() < 1e-9);
    }

    #[test]
    fn test_collector_tracks_active_agents() {
        let collector = SystemMetricsCollector::new();
        let agent_id = Uuid::now_v7();
        collector.on_event(&EventEnvelope::new(LifecycleEvent::AgentCreated {
            agent_id,
            name: "helper".to_string(),
        }));
        assert_eq!(collector.snapshot().active_agents, 1);
        collector.on_event(&EventEnvelope::new(LifecycleEvent::AgentDestroyed {
            agent_id,
        }));
        collector.on_event(&EventEnvelope::new(LifecycleEvent::AgentDestroyed {
            agent_id,
        }));
        assert_eq!(collector.snapshot().active_agents, 0);
    }

    #[test]
    fn test_request_pipeline_creates_agent_and_releases_resources() {
        let mut node = GodNode::new(OvermindConfig::standard(), &test_providers()).unwrap();
        let request = UserRequest::new("chat_message", "hello there");

        let result = node.process_user_request(&request).unwrap();
        assert!(result.output.contains("hello there"));
        assert_eq!(node.agents().len(), 1);
        // Resources fully released after the pipeline.
        assert!(node.pool().current_usage().is_zero());

        let metrics = node.metrics();
        assert_eq!(metrics.active_agents, 1);
        assert_eq!(metrics.total_tasks, 1);
        // (1.0 * 9 + 1) / 10 stays at 1.0.
        assert!((metrics.success_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_registered_blueprint_preferred_over_default_template() {
        use overmind_agents::{AgentBlueprint, BlueprintMetadata};

        let mut node = GodNode::new(OvermindConfig::standard(), &test_providers()).unwrap();
        node.registry_mut()
            .register(
                "chat-specialist",
                AgentBlueprint::for_model("blueprint-model"),
                BlueprintMetadata::new("handles chat", vec!["conversation".to_string()]),
            )
            .unwrap();

        node.process_user_request(&UserRequest::new("chat_message", "hello"))
            .unwrap();

        let agents = node.agents();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].1, "chat-specialist");
        let agent = node.orchestrator_mut().agent(agents[0].0).unwrap();
        assert_eq!(agent.config().model, "blueprint-model");
    }

    #[test]
    fn test_request_pipeline_reuses_capable_agent() {
        let mut node = GodNode::new(OvermindConfig::standard(), &test_providers()).unwrap();
        node.process_user_request(&UserRequest::new("chat_message", "first"))
            .unwrap();
        node.process_user_request(&UserRequest::new("chat_message", "second"))
            .unwrap();
        assert_eq!(node.agents().len(), 1);
    }

    #[test]
    fn test_insufficient_resources_rejected_before_execution() {
        let config = OvermindConfig::standard()
            .with_resource_limits(ResourceUsage::new(10, 0, 0, 0));
        let mut node = GodNode::new(config, &test_providers()).unwrap();

        let err = node
            .process_user_request(&UserRequest::new("chat_message", "hello"))
            .unwrap_err();
        assert!(err.to_string().contains("Insufficient resources"));
        // Nothing ran: no tasks counted, usage untouched.
        assert_eq!(node.metrics().total_tasks, 0);
        assert!(node.pool().current_usage().is_zero());
    }

    #[test]
    fn test_learning_hook_updates_knowledge_graph() {
        let mut providers = ProviderRegistry::new();
        providers.register_text(Arc::new(MockTextProvider::new()));
        providers.register_classifier(Arc::new(MockClassifier::new(vec![
            "research".to_string(),
            "writing".to_string(),
        ])));
        let mut node = GodNode::new(OvermindConfig::standard(), &providers).unwrap();

        let result = node
            .process_user_request(&UserRequest::new("chat_message", "write a summary"))
            .unwrap();

        let knowledge = node.knowledge_mut();
        let research = knowledge.find_by_concept("research").unwrap();
        assert!(research.referenced_by.contains(&result.agent_id));
        let research_id = research.node_id;
        let related = knowledge.related(research_id);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].concept, "writing");
    }

    #[test]
    fn test_external_observer_sees_pipeline_events() {
        let mut node = GodNode::new(OvermindConfig::standard(), &test_providers()).unwrap();
        let observer = Arc::new(overmind_events::CollectingObserver::new());
        node.bus().subscribe(observer.clone());

        node.process_user_request(&UserRequest::new("chat_message", "hello"))
            .unwrap();
        let kinds = observer.kinds();
        assert_eq!(
            kinds,
            vec![
                EventKind::AgentCreated,
                EventKind::TaskStarted,
                EventKind::TaskCompleted,
            ]
        );
    }
}
