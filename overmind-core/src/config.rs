//! Configuration types

use crate::{AgentConfig, ResourceUsage};
use serde::{Deserialize, Serialize};

/// Thresholds used by evolution analysis to flag degraded performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionThresholds {
    /// Success rate below this flags "task success below threshold"
    pub min_success_rate: f64,
    /// Average response time above this (ms) flags "response time too high"
    pub max_response_time_ms: f64,
    /// User satisfaction below this flags "user satisfaction below threshold"
    pub min_user_satisfaction: f64,
}

impl Default for EvolutionThresholds {
    fn default() -> Self {
        Self {
            min_success_rate: 0.8,
            max_response_time_ms: 2000.0,
            min_user_satisfaction: 0.7,
        }
    }
}

/// Template parameters for agents created on demand for a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// Model identifier for templated agents
    pub model: String,
    /// Generation temperature
    pub temperature: f32,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Learning rate
    pub learning_rate: f64,
    /// Evolution threshold
    pub evolution_threshold: f64,
    /// Memory retention window in days
    pub memory_retention_days: i64,
}

impl AgentDefaults {
    /// Build an agent configuration templated on a capability name.
    pub fn config_for_capability(&self, capability: &str) -> AgentConfig {
        AgentConfig::new(
            &format!("{capability}-agent"),
            &format!("Agent specialized in {capability}"),
            &self.model,
        )
        .with_capabilities(vec![capability.to_string()])
        .with_generation(self.temperature, self.max_tokens)
        .with_learning_rate(self.learning_rate)
        .with_evolution_threshold(self.evolution_threshold)
        .with_memory_retention_days(self.memory_retention_days)
    }
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: "default-model".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            learning_rate: 0.1,
            evolution_threshold: 0.7,
            memory_retention_days: 30,
        }
    }
}

/// Parameters for sizing a request's resource requirements.
///
/// The estimate scales with content length instead of using a fixed amount:
/// `base_cost` plus per-kilobyte increments for tokens and memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCosts {
    /// Floor cost charged for any request
    pub base_cost: ResourceUsage,
    /// Additional tokens charged per kilobyte of request content
    pub tokens_per_kilobyte: u64,
    /// Additional memory bytes charged per kilobyte of request content
    pub memory_per_kilobyte: u64,
}

impl RequestCosts {
    /// Estimate the requirements for request content of the given length.
    pub fn estimate(&self, content_len: usize) -> ResourceUsage {
        let kilobytes = (content_len as u64).div_ceil(1024);
        ResourceUsage {
            tokens: self.base_cost.tokens + kilobytes * self.tokens_per_kilobyte,
            compute_units: self.base_cost.compute_units,
            memory: self.base_cost.memory + kilobytes * self.memory_per_kilobyte,
            storage: self.base_cost.storage,
        }
    }
}

impl Default for RequestCosts {
    fn default() -> Self {
        Self {
            base_cost: ResourceUsage::new(500, 1, 64 * 1024, 0),
            tokens_per_kilobyte: 256,
            memory_per_kilobyte: 4 * 1024,
        }
    }
}

/// Master configuration struct, wired once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvermindConfig {
    /// Hard ceilings for the resource pool
    pub resource_limits: ResourceUsage,
    /// Evolution analysis thresholds
    pub evolution: EvolutionThresholds,
    /// Template for agents created on demand
    pub agent_defaults: AgentDefaults,
    /// Request sizing parameters
    pub request_costs: RequestCosts,
    /// Capability assumed when request analysis yields nothing
    pub default_capability: String,
}

impl OvermindConfig {
    /// Standard configuration with sane limits.
    ///
    /// This centralizes the defaults so embedding applications can start
    /// from something working and override selectively.
    pub fn standard() -> Self {
        Self {
            resource_limits: ResourceUsage::new(1_000_000, 100, 8 * 1024 * 1024 * 1024, 100 * 1024 * 1024 * 1024),
            evolution: EvolutionThresholds::default(),
            agent_defaults: AgentDefaults::default(),
            request_costs: RequestCosts::default(),
            default_capability: "conversation".to_string(),
        }
    }

    /// Override the resource ceilings.
    pub fn with_resource_limits(mut self, limits: ResourceUsage) -> Self {
        self.resource_limits = limits;
        self
    }
}

impl Default for OvermindConfig {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evolution_thresholds_defaults() {
        let thresholds = EvolutionThresholds::default();
        assert_eq!(thresholds.min_success_rate, 0.8);
        assert_eq!(thresholds.max_response_time_ms, 2000.0);
        assert_eq!(thresholds.min_user_satisfaction, 0.7);
    }

    #[test]
    fn test_agent_defaults_template() {
        let defaults = AgentDefaults::default();
        let config = defaults.config_for_capability("reflection");
        assert_eq!(config.name, "reflection-agent");
        assert!(config.capabilities.contains(&"reflection".to_string()));
        assert_eq!(config.model, defaults.model);
    }

    #[test]
    fn test_request_costs_scale_with_content() {
        let costs = RequestCosts {
            base_cost: ResourceUsage::new(100, 1, 1000, 0),
            tokens_per_kilobyte: 10,
            memory_per_kilobyte: 100,
        };
        // Empty content pays exactly the base cost.
        assert_eq!(costs.estimate(0), ResourceUsage::new(100, 1, 1000, 0));
        // One byte rounds up to one kilobyte.
        assert_eq!(costs.estimate(1), ResourceUsage::new(110, 1, 1100, 0));
        // 2.5 KiB rounds up to three.
        assert_eq!(costs.estimate(2560), ResourceUsage::new(130, 1, 1300, 0));
    }

    #[test]
    fn test_standard_config_serde_roundtrip() {
        let config = OvermindConfig::standard();
        let json = serde_json::to_string(&config).unwrap();
        let back: OvermindConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
