//! Overmind Test Utilities
//!
//! Centralized test infrastructure for the Overmind workspace:
//! - Proptest generators for core entity types
//! - Fixtures for common agent/task scenarios
//! - Re-exports of the mock providers so tests need one import

// Re-export mock providers from their source crate
pub use overmind_llm::{MockClassifier, MockTextProvider, ScriptedClassifier, ScriptedTextProvider};

// Re-export core types for convenience
pub use overmind_core::{
    AgentConfig, AgentId, AgentMetrics, AgentPhase, AgentState, AgentStatus, EventKind,
    EvolutionThresholds, Experience, ExperienceOutcome, LifecycleEvent, OvermindConfig,
    OvermindError, OvermindResult, ResourceUsage, SubTask, Task, TaskId, TaskPriority,
    TaskStatus, UserRequest,
};

use overmind_agents::AgentRuntime;
use overmind_events::EventBus;
use overmind_llm::TextGeneration;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// FIXTURES
// ============================================================================

/// An agent configuration suitable for most tests.
pub fn test_agent_config() -> AgentConfig {
    AgentConfig::new("test-agent", "an agent used in tests", "test-model")
        .with_capabilities(vec!["conversation".to_string()])
}

/// An agent runtime wired to the echoing mock provider and a fresh bus.
pub fn test_agent() -> AgentRuntime {
    test_agent_with_provider(Arc::new(MockTextProvider::new()))
}

/// An agent runtime wired to the given provider and a fresh bus.
pub fn test_agent_with_provider(provider: Arc<dyn TextGeneration>) -> AgentRuntime {
    AgentRuntime::new(test_agent_config(), provider, Arc::new(EventBus::new()))
}

/// A flat task assigned to the given agent.
pub fn test_task(agent_id: AgentId) -> Task {
    Task::new("say something useful", "chat_message").with_agents(vec![agent_id])
}

/// A three-subtask chain: the second depends on the first, the third on both.
pub fn chained_subtask_plan() -> String {
    serde_json::json!([
        {"description": "gather", "required_capabilities": ["research"]},
        {"description": "analyze", "required_capabilities": ["analysis"], "dependencies": [0]},
        {"description": "report", "required_capabilities": ["writing"], "dependencies": [0, 1]},
    ])
    .to_string()
}

/// A successful experience with neutral feedback.
pub fn test_experience(context: &str) -> Experience {
    Experience::new(context, ExperienceOutcome::success("ok"), 0.0)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Strategy for resource amounts small enough to sum without overflow.
pub fn arb_resource_usage() -> impl Strategy<Value = ResourceUsage> {
    (0u64..10_000, 0u64..100, 0u64..1_000_000, 0u64..1_000_000)
        .prop_map(|(tokens, compute, memory, storage)| {
            ResourceUsage::new(tokens, compute, memory, storage)
        })
}

/// Strategy for any task status.
pub fn arb_task_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Pending),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Completed),
        Just(TaskStatus::Failed),
    ]
}

/// Strategy for any task priority.
pub fn arb_task_priority() -> impl Strategy<Value = TaskPriority> {
    prop_oneof![
        Just(TaskPriority::Low),
        Just(TaskPriority::Normal),
        Just(TaskPriority::High),
        Just(TaskPriority::Critical),
    ]
}

/// Strategy for feedback scores in the valid [-1, 1] range.
pub fn arb_feedback() -> impl Strategy<Value = f64> {
    -1.0f64..=1.0
}

/// Strategy for experiences with arbitrary outcome and feedback.
pub fn arb_experience() -> impl Strategy<Value = Experience> {
    (any::<bool>(), arb_feedback(), "[a-z ]{1,40}").prop_map(|(success, feedback, context)| {
        let outcome = if success {
            ExperienceOutcome::success("result")
        } else {
            ExperienceOutcome::failure("error")
        };
        Experience::new(&context, outcome, feedback)
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_agent_starts_idle() {
        let agent = test_agent();
        assert!(agent.state().phase.is_idle());
        assert!(agent.has_capability("conversation"));
    }

    #[test]
    fn test_chained_plan_is_valid_json() {
        let plan: serde_json::Value = serde_json::from_str(&chained_subtask_plan()).unwrap();
        assert_eq!(plan.as_array().unwrap().len(), 3);
    }

    mod prop_tests {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_generated_feedback_is_clamped(experience in arb_experience()) {
                prop_assert!(experience.feedback >= -1.0 && experience.feedback <= 1.0);
            }

            #[test]
            fn prop_generated_usage_sums_safely(
                a in arb_resource_usage(),
                b in arb_resource_usage()
            ) {
                let sum = a.plus(&b);
                prop_assert!(sum.tokens >= a.tokens && sum.tokens >= b.tokens);
            }
        }
    }
}
