//! Performance-triggered agent evolution.
//!
//! The evolution manager keeps a name-keyed registry of strategies and runs
//! the evolution pipeline against an agent runtime: analyze metrics, generate
//! an improvement plan through the text provider, apply the strategy's
//! mutation hook, verify. Failures anywhere in the pipeline are contained in
//! the returned report and never propagate to the caller.

use crate::runtime::AgentRuntime;
use overmind_core::{
    AgentConfig, AgentMetrics, AgentPhase, AgentState, EvolutionError, EvolutionReport,
    EvolutionThresholds, LifecycleEvent, OvermindResult,
};
use overmind_llm::{ChatMessage, GenerationParams, TextGeneration};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// IMPROVEMENT PLAN
// ============================================================================

/// Free-form improvement plan produced by the text provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImprovementPlan {
    /// Behavioral improvements to apply
    #[serde(default)]
    pub improvements: Vec<String>,
    /// Capabilities the agent should gain
    #[serde(default)]
    pub new_capabilities: Vec<String>,
}

impl ImprovementPlan {
    /// Parse a provider response leniently.
    ///
    /// Accepts a JSON object with `improvements` / `new_capabilities` arrays.
    /// Anything else degrades to a line-based reading: every non-empty line
    /// becomes one improvement, so a plain bulleted reply still yields a
    /// usable plan.
    pub fn parse(response: &str) -> Self {
        if let Ok(plan) = serde_json::from_str::<ImprovementPlan>(response) {
            return plan;
        }
        let improvements = response
            .lines()
            .map(|line| line.trim().trim_start_matches('-').trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();
        Self {
            improvements,
            new_capabilities: Vec::new(),
        }
    }
}

// ============================================================================
// STRATEGY TRAIT
// ============================================================================

/// A pluggable evolution strategy.
///
/// `should_evolve` gates the pipeline; `mutate` and `verify` are extension
/// points with safe defaults. The default shipped strategy keeps both as
/// no-ops and relies on the generated plan alone.
pub trait EvolutionStrategy: Send + Sync {
    /// Strategy name for logging and reporting.
    fn name(&self) -> &str;

    /// Whether this agent's metrics warrant evolving at all.
    fn should_evolve(&self, metrics: &AgentMetrics) -> bool;

    /// Mutate the agent's state according to the plan.
    fn mutate(
        &self,
        _config: &AgentConfig,
        _state: &mut AgentState,
        _plan: &ImprovementPlan,
    ) -> OvermindResult<()> {
        Ok(())
    }

    /// Verify the evolution took hold.
    fn verify(&self, _state: &AgentState) -> OvermindResult<()> {
        Ok(())
    }
}

/// The strategy pre-registered under the name `default`.
///
/// Evolves whenever the rolling success rate has dropped below the agent's
/// configured threshold. Mutation applies the plan's new capabilities and
/// leaves behavior changes to the improvement list consumed by callers.
pub struct DefaultStrategy {
    threshold: f64,
}

impl DefaultStrategy {
    /// A default strategy gating at the given success-rate floor.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl EvolutionStrategy for DefaultStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn should_evolve(&self, metrics: &AgentMetrics) -> bool {
        metrics.success_rate < self.threshold
    }

    fn mutate(
        &self,
        _config: &AgentConfig,
        state: &mut AgentState,
        plan: &ImprovementPlan,
    ) -> OvermindResult<()> {
        for capability in &plan.new_capabilities {
            if !state.has_capability(capability) {
                state.capabilities.push(capability.clone());
            }
        }
        Ok(())
    }
}

// ============================================================================
// EVOLUTION MANAGER
// ============================================================================

/// Registry of evolution strategies plus the pipeline runner.
pub struct EvolutionManager {
    strategies: HashMap<String, Box<dyn EvolutionStrategy>>,
    provider: Arc<dyn TextGeneration>,
    thresholds: EvolutionThresholds,
}

impl EvolutionManager {
    /// Create a manager with the default strategy pre-registered.
    pub fn new(provider: Arc<dyn TextGeneration>, thresholds: EvolutionThresholds) -> Self {
        let mut strategies: HashMap<String, Box<dyn EvolutionStrategy>> = HashMap::new();
        strategies.insert(
            "default".to_string(),
            Box::new(DefaultStrategy::new(thresholds.min_success_rate)),
        );
        Self {
            strategies,
            provider,
            thresholds,
        }
    }

    /// Register a strategy under its own name, replacing any previous one.
    pub fn register_strategy(&mut self, strategy: Box<dyn EvolutionStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    /// Names of all registered strategies.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.keys().map(|k| k.as_str()).collect()
    }

    /// Run the evolution pipeline against an agent.
    ///
    /// Never returns an error: every failure in the pipeline is folded into
    /// the report with `success: false`. The agent's phase is restored to
    /// idle regardless of outcome.
    pub fn evolve_agent(&self, agent: &mut AgentRuntime, strategy_name: &str) -> EvolutionReport {
        let agent_id = agent.id();

        let strategy = match self.strategies.get(strategy_name) {
            Some(strategy) => strategy,
            None => {
                let err = EvolutionError::StrategyNotFound {
                    name: strategy_name.to_string(),
                };
                warn!(%agent_id, strategy = strategy_name, "evolution strategy not found");
                return EvolutionReport::failed(agent_id, strategy_name, &err.to_string());
            }
        };

        if !strategy.should_evolve(agent.metrics()) {
            return EvolutionReport::skipped(agent_id, strategy_name);
        }

        if !agent.state().phase.is_idle() {
            let reason = format!(
                "agent is {}, expected idle",
                agent.state().phase.status()
            );
            warn!(%agent_id, strategy = strategy_name, %reason, "evolution refused");
            return EvolutionReport::failed(agent_id, strategy_name, &reason);
        }

        agent.set_phase(AgentPhase::Evolving);
        agent.bus().emit(LifecycleEvent::EvolutionStarted {
            agent_id,
            strategy: strategy_name.to_string(),
        });

        let outcome = self.run_pipeline(agent, strategy.as_ref());
        agent.set_phase(AgentPhase::Idle);

        let report = match outcome {
            Ok((issues, plan)) => {
                info!(
                    %agent_id,
                    strategy = strategy_name,
                    issues = issues.len(),
                    improvements = plan.improvements.len(),
                    "evolution completed"
                );
                EvolutionReport {
                    success: true,
                    agent_id,
                    strategy: strategy_name.to_string(),
                    issues,
                    improvements: plan.improvements,
                    new_capabilities: plan.new_capabilities,
                    error: None,
                }
            }
            Err(err) => {
                warn!(%agent_id, strategy = strategy_name, error = %err, "evolution failed");
                EvolutionReport::failed(agent_id, strategy_name, &err.to_string())
            }
        };

        agent.bus().emit(LifecycleEvent::EvolutionCompleted {
            agent_id,
            success: report.success,
        });
        report
    }

    fn run_pipeline(
        &self,
        agent: &mut AgentRuntime,
        strategy: &dyn EvolutionStrategy,
    ) -> OvermindResult<(Vec<String>, ImprovementPlan)> {
        let issues = self.analyze_performance(agent.metrics());
        let plan = self.generate_plan(agent, &issues)?;
        let config = agent.config().clone();
        strategy.mutate(&config, agent.state_mut(), &plan)?;
        strategy.verify(agent.state())?;
        Ok((issues, plan))
    }

    /// Flag degraded metrics against the configured thresholds.
    fn analyze_performance(&self, metrics: &AgentMetrics) -> Vec<String> {
        let mut issues = Vec::new();
        if metrics.success_rate < self.thresholds.min_success_rate {
            issues.push("task success below threshold".to_string());
        }
        if metrics.average_response_time > self.thresholds.max_response_time_ms {
            issues.push("response time too high".to_string());
        }
        if metrics.user_satisfaction < self.thresholds.min_user_satisfaction {
            issues.push("user satisfaction below threshold".to_string());
        }
        issues
    }

    fn generate_plan(
        &self,
        agent: &AgentRuntime,
        issues: &[String],
    ) -> OvermindResult<ImprovementPlan> {
        let config = agent.config();
        let metrics = agent.metrics();
        let prompt = format!(
            "Agent '{}' is underperforming.\n\
             Success rate: {:.2}, average response time: {:.0}ms, user satisfaction: {:.2}.\n\
             Issues: {}.\n\
             Respond with a JSON object: {{\"improvements\": [...], \"new_capabilities\": [...]}}",
            config.name,
            metrics.success_rate,
            metrics.average_response_time,
            metrics.user_satisfaction,
            issues.join("; "),
        );
        let params = GenerationParams::new(&config.model, config.temperature, config.max_tokens);
        let response = self
            .provider
            .generate(
                &[ChatMessage::user(&prompt)],
                "You are an agent-improvement planner. Output JSON only.",
                &params,
            )
            .map_err(|err| EvolutionError::PlanGeneration {
                reason: err.to_string(),
            })?;
        Ok(ImprovementPlan::parse(&response))
    }
}

// ============================================================================
// TESTS
// ============================================================================
