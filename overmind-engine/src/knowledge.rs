//! Weighted concept graph.
//!
//! Small in-memory graph used to enrich agent prompts with related concepts.
//! Node removal scans every remaining node's edge set for inbound edges,
//! which is linear in the node count and acceptable at this scale.

use chrono::Utc;
use overmind_core::{AgentId, ConceptId, KnowledgeNode};
use std::collections::HashMap;
use tracing::debug;

/// In-memory knowledge graph keyed by concept node id.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    nodes: HashMap<ConceptId, KnowledgeNode>,
}

impl KnowledgeGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Insert a node, returning its id. Replaces a node with the same id.
    pub fn add_node(&mut self, node: KnowledgeNode) -> ConceptId {
        let node_id = node.node_id;
        self.nodes.insert(node_id, node);
        node_id
    }

    /// Insert or overwrite a weighted edge between two existing nodes.
    ///
    /// Returns `false` without change when either endpoint is missing.
    pub fn add_edge(&mut self, from: ConceptId, to: ConceptId, weight: f64) -> bool {
        if !self.nodes.contains_key(&to) {
            return false;
        }
        match self.nodes.get_mut(&from) {
            Some(node) => {
                node.edges.insert(to, weight);
                true
            }
            None => false,
        }
    }

    /// Nodes one outgoing edge away with weight at or above `min_weight`.
    ///
    /// Stamps the queried node's last-accessed time.
    pub fn related_concepts(&mut self, node_id: ConceptId, min_weight: f64) -> Vec<&KnowledgeNode> {
        let targets: Vec<ConceptId> = match self.nodes.get_mut(&node_id) {
            Some(node) => {
                node.last_accessed = Utc::now();
                node.edges
                    .iter()
                    .filter(|(_, &weight)| weight >= min_weight)
                    .map(|(&target, _)| target)
                    .collect()
            }
            None => return Vec::new(),
        };
        targets
            .iter()
            .filter_map(|target| self.nodes.get(target))
            .collect()
    }

    /// `related_concepts` with the conventional 0.5 weight floor.
    pub fn related(&mut self, node_id: ConceptId) -> Vec<&KnowledgeNode> {
        self.related_concepts(node_id, 0.5)
    }

    /// Remove a node, its outgoing edges, and every inbound edge to it.
    pub fn remove_node(&mut self, node_id: ConceptId) -> Option<KnowledgeNode> {
        let removed = self.nodes.remove(&node_id)?;
        for node in self.nodes.values_mut() {
            node.edges.remove(&node_id);
        }
        debug!(concept = %removed.concept, "removed knowledge node");
        Some(removed)
    }

    /// Look up a node by id.
    pub fn node(&self, node_id: ConceptId) -> Option<&KnowledgeNode> {
        self.nodes.get(&node_id)
    }

    /// Find a node by its concept label.
    pub fn find_by_concept(&self, concept: &str) -> Option<&KnowledgeNode> {
        self.nodes.values().find(|n| n.concept == concept)
    }

    /// Ensure a node exists for the concept label, returning its id.
    pub fn ensure_concept(&mut self, concept: &str) -> ConceptId {
        if let Some(node) = self.nodes.values().find(|n| n.concept == concept) {
            return node.node_id;
        }
        self.add_node(KnowledgeNode::new(concept))
    }

    /// Record that an agent references a concept.
    pub fn record_reference(&mut self, node_id: ConceptId, agent_id: AgentId) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.add_reference(agent_id);
        }
    }

    /// Prompt-context line for a concept: the concept plus its strongly
    /// related neighbors. Empty string for unknown concepts.
    pub fn context_for(&mut self, concept: &str) -> String {
        let Some(node_id) = self.find_by_concept(concept).map(|n| n.node_id) else {
            return String::new();
        };
        let related: Vec<String> = self
            .related(node_id)
            .iter()
            .map(|n| n.concept.clone())
            .collect();
        if related.is_empty() {
            concept.to_string()
        } else {
            format!("{} (related: {})", concept, related.join(", "))
        }
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
