//! Agent blueprint registry.
//!
//! Blueprints are declarative data records interpreted by the one generic
//! agent runtime. The registry is a pure lookup table keyed by globally
//! unique names - it never instantiates runtimes.

use overmind_core::{AgentConfig, OvermindError, OvermindResult, RegistryError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// BLUEPRINT TYPES
// ============================================================================

/// Declarative template for creating agents of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBlueprint {
    /// Model identifier
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

impl AgentBlueprint {
    /// A blueprint with conventional parameters for the given model.
    pub fn for_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            learning_rate: 0.1,
            evolution_threshold: 0.7,
            memory_retention_days: 30,
        }
    }
}

/// Descriptive metadata stored alongside a blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintMetadata {
    /// What agents built from this blueprint do
    pub description: String,
    /// Capabilities agents built from this blueprint provide
    pub capabilities: Vec<String>,
    /// Free-form tags
    pub tags: Vec<String>,
}

impl BlueprintMetadata {
    /// Metadata with a description and capability list.
    pub fn new(description: &str, capabilities: Vec<String>) -> Self {
        Self {
            description: description.to_string(),
            capabilities,
            tags: Vec::new(),
        }
    }
}

/// A named blueprint plus its metadata, as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredBlueprint {
    /// Globally unique blueprint name
    pub name: String,
    /// The blueprint itself
    pub blueprint: AgentBlueprint,
    /// Descriptive metadata
    pub metadata: BlueprintMetadata,
}

impl RegisteredBlueprint {
    /// Build an agent configuration from this blueprint.
    pub fn instantiate(&self) -> AgentConfig {
        AgentConfig::new(&self.name, &self.metadata.description, &self.blueprint.model)
            .with_capabilities(self.metadata.capabilities.clone())
            .with_generation(self.blueprint.temperature, self.blueprint.max_tokens)
            .with_learning_rate(self.blueprint.learning_rate)
            .with_evolution_threshold(self.blueprint.evolution_threshold)
            .with_memory_retention_days(self.blueprint.memory_retention_days)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Catalog mapping blueprint names to blueprints and metadata.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    entries: HashMap<String, RegisteredBlueprint>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a blueprint under a globally unique name.
    ///
    /// # Errors
    /// `RegistryError::DuplicateName` if the name is already taken.
    pub fn register(
        &mut self,
        name: &str,
        blueprint: AgentBlueprint,
        metadata: BlueprintMetadata,
    ) -> OvermindResult<()> {
        if self.entries.contains_key(name) {
            return Err(OvermindError::Registry(RegistryError::DuplicateName {
                name: name.to_string(),
            }));
        }
        self.entries.insert(
            name.to_string(),
            RegisteredBlueprint {
                name: name.to_string(),
                blueprint,
                metadata,
            },
        );
        Ok(())
    }

    /// Look up a blueprint by name.
    ///
    /// # Errors
    /// `RegistryError::NotFound` if absent.
    pub fn get(&self, name: &str) -> OvermindResult<&RegisteredBlueprint> {
        self.entries
            .get(name)
            .ok_or_else(|| {
                OvermindError::Registry(RegistryError::NotFound {
                    name: name.to_string(),
                })
            })
    }

    /// All blueprints whose metadata lists the capability. Unordered, may be
    /// empty.
    pub fn find_by_capability(&self, capability: &str) -> Vec<&RegisteredBlueprint> {
        self.entries
            .values()
            .filter(|entry| {
                entry
                    .metadata
                    .capabilities
                    .iter()
                    .any(|c| c == capability)
            })
            .collect()
    }

    /// All registered names with their metadata.
    pub fn list_all(&self) -> Vec<(&str, &BlueprintMetadata)> {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), &entry.metadata))
            .collect()
    }

    /// Number of registered blueprints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
