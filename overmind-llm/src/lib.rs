//! Overmind LLM - Capability provider boundary
//!
//! Provider-agnostic traits for the two external capabilities the engine
//! consumes: text generation and capability classification. This crate
//! defines the interfaces providers must implement; actual provider
//! implementations are user-supplied.

use overmind_core::{LlmError, OvermindError, OvermindResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ============================================================================
// MESSAGE AND PARAMETER TYPES
// ============================================================================

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a conversation sent to a text-generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who produced the message
    pub role: ChatRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// A user message.
    pub fn user(content: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: content.to_string(),
        }
    }

    /// An assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.to_string(),
        }
    }

    /// A system message.
    pub fn system(content: &str) -> Self {
        Self {
            role: ChatRole::System,
            content: content.to_string(),
        }
    }
}

/// Generation parameters taken from the agent's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum output size in tokens
    pub max_tokens: u32,
}

impl GenerationParams {
    /// Construct from explicit values.
    pub fn new(model: &str, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }
}

// ============================================================================
// TEXT GENERATION PROVIDER TRAIT
// ============================================================================

/// Trait for text-generation providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct OpenAiChat { /* ... */ }
///
/// impl TextGeneration for OpenAiChat {
///     fn generate(
///         &self,
///         messages: &[ChatMessage],
///         system_prompt: &str,
///         params: &GenerationParams,
///     ) -> OvermindResult<String> {
///         // Call the chat completions API
///     }
/// }
/// ```
pub trait TextGeneration: Send + Sync {
    /// Generate a completion for the given conversation.
    ///
    /// # Arguments
    /// * `messages` - Ordered conversation messages
    /// * `system_prompt` - System prompt prepended to the conversation
    /// * `params` - Model, temperature, and output-size parameters
    ///
    /// # Returns
    /// * `Ok(String)` - The completion text
    /// * `Err(OvermindError::Llm)` - On quota, timeout, or invalid requests
    fn generate(
        &self,
        messages: &[ChatMessage],
        system_prompt: &str,
        params: &GenerationParams,
    ) -> OvermindResult<String>;
}

// ============================================================================
// CAPABILITY CLASSIFIER TRAIT
// ============================================================================

/// Trait for capability classifiers.
///
/// The classifier powers request analysis (free text -> capability set) and
/// task decomposition (free text -> structured subtask plan). Decomposition
/// output is returned raw; the decomposer validates the structure and fails
/// the whole operation on malformed output.
pub trait CapabilityClassifier: Send + Sync {
    /// Classify free text into the set of capabilities it requires.
    fn classify(&self, text: &str) -> OvermindResult<Vec<String>>;

    /// Produce a structured decomposition plan for a task description.
    ///
    /// The returned string is expected to be a JSON array of
    /// `{description, required_capabilities, dependencies}` records, where
    /// dependencies are zero-based indexes of earlier records.
    fn decompose(&self, description: &str) -> OvermindResult<String>;
}

// ============================================================================
// PROVIDER REGISTRY
// ============================================================================

/// Registry for capability providers.
/// Providers must be explicitly registered - no auto-discovery.
pub struct ProviderRegistry {
    /// Registered text-generation provider (optional)
    text: Option<Arc<dyn TextGeneration>>,
    /// Registered classifier (optional)
    classifier: Option<Arc<dyn CapabilityClassifier>>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry.
    pub fn new() -> Self {
        Self {
            text: None,
            classifier: None,
        }
    }

    /// Register a text-generation provider.
    /// Replaces any previously registered provider.
    pub fn register_text(&mut self, provider: Arc<dyn TextGeneration>) {
        self.text = Some(provider);
    }

    /// Register a classifier.
    /// Replaces any previously registered classifier.
    pub fn register_classifier(&mut self, provider: Arc<dyn CapabilityClassifier>) {
        self.classifier = Some(provider);
    }

    /// Get the registered text-generation provider.
    ///
    /// # Returns
    /// * `Err(LlmError::ProviderNotConfigured)` - If none registered
    pub fn text(&self) -> OvermindResult<Arc<dyn TextGeneration>> {
        self.text
            .clone()
            .ok_or(OvermindError::Llm(LlmError::ProviderNotConfigured))
    }

    /// Get the registered classifier.
    ///
    /// # Returns
    /// * `Err(LlmError::ProviderNotConfigured)` - If none registered
    pub fn classifier(&self) -> OvermindResult<Arc<dyn CapabilityClassifier>> {
        self.classifier
            .clone()
            .ok_or(OvermindError::Llm(LlmError::ProviderNotConfigured))
    }

    /// Check if a text-generation provider is registered.
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    /// Check if a classifier is registered.
    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("text", &self.text.is_some())
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}

// ============================================================================
// MOCK PROVIDERS FOR TESTING
// ============================================================================

/// Mock text-generation provider for testing.
/// Echoes the last user message, prefixed with the model id.
#[derive(Debug, Clone)]
pub struct MockTextProvider {
    reply_prefix: String,
}

impl MockTextProvider {
    /// Create a mock provider with the default prefix.
    pub fn new() -> Self {
        Self {
            reply_prefix: "reply".to_string(),
        }
    }

    /// Create a mock provider with a custom prefix.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            reply_prefix: prefix.to_string(),
        }
    }
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TextGeneration for MockTextProvider {
    fn generate(
        &self,
        messages: &[ChatMessage],
        _system_prompt: &str,
        params: &GenerationParams,
    ) -> OvermindResult<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(format!(
            "{} [{}]: {}",
            self.reply_prefix, params.model, last_user
        ))
    }
}

/// Scripted text-generation provider for testing.
/// Returns pre-loaded responses in order; fails when the script runs out.
pub struct ScriptedTextProvider {
    script: Mutex<VecDeque<OvermindResult<String>>>,
}

impl ScriptedTextProvider {
    /// Create an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a successful response.
    pub fn push_ok(&self, response: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(response.to_string()));
        }
    }

    /// Queue a provider failure.
    pub fn push_err(&self, message: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(OvermindError::Llm(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                message: message.to_string(),
            })));
        }
    }

    /// Number of responses remaining in the script.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for ScriptedTextProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TextGeneration for ScriptedTextProvider {
    fn generate(
        &self,
        _messages: &[ChatMessage],
        _system_prompt: &str,
        _params: &GenerationParams,
    ) -> OvermindResult<String> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| {
                OvermindError::Llm(LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    message: "script lock poisoned".to_string(),
                })
            })?;
        script.pop_front().unwrap_or_else(|| {
            Err(OvermindError::Llm(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                message: "script exhausted".to_string(),
            }))
        })
    }
}

impl std::fmt::Debug for ScriptedTextProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTextProvider")
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Mock classifier for testing.
/// Classifies everything into a fixed capability set and decomposes every
/// description into a single subtask.
#[derive(Debug, Clone)]
pub struct MockClassifier {
    capabilities: Vec<String>,
}

impl MockClassifier {
    /// Create a mock classifier returning the given capabilities.
    pub fn new(capabilities: Vec<String>) -> Self {
        Self { capabilities }
    }
}

impl CapabilityClassifier for MockClassifier {
    fn classify(&self, _text: &str) -> OvermindResult<Vec<String>> {
        Ok(self.capabilities.clone())
    }

    fn decompose(&self, description: &str) -> OvermindResult<String> {
        let plan = serde_json::json!([{
            "description": description,
            "required_capabilities": self.capabilities,
            "dependencies": [],
        }]);
        Ok(plan.to_string())
    }
}

/// Scripted classifier for testing.
/// Returns pre-loaded classification and decomposition responses in order;
/// falls back to a fixed behavior when the respective script is empty.
pub struct ScriptedClassifier {
    classifications: Mutex<VecDeque<OvermindResult<Vec<String>>>>,
    decompositions: Mutex<VecDeque<OvermindResult<String>>>,
    fallback: MockClassifier,
}

impl ScriptedClassifier {
    /// Create a scripted classifier with an empty script and a
    /// single-capability fallback.
    pub fn new() -> Self {
        Self {
            classifications: Mutex::new(VecDeque::new()),
            decompositions: Mutex::new(VecDeque::new()),
            fallback: MockClassifier::new(vec!["conversation".to_string()]),
        }
    }

    /// Queue a classification result.
    pub fn push_classification(&self, capabilities: Vec<String>) {
        if let Ok(mut script) = self.classifications.lock() {
            script.push_back(Ok(capabilities));
        }
    }

    /// Queue a classification failure.
    pub fn push_classification_err(&self, message: &str) {
        if let Ok(mut script) = self.classifications.lock() {
            script.push_back(Err(OvermindError::Llm(LlmError::InvalidResponse {
                provider: "scripted".to_string(),
                reason: message.to_string(),
            })));
        }
    }

    /// Queue a raw decomposition response.
    pub fn push_decomposition(&self, response: &str) {
        if let Ok(mut script) = self.decompositions.lock() {
            script.push_back(Ok(response.to_string()));
        }
    }

    /// Queue a decomposition failure.
    pub fn push_decomposition_err(&self, message: &str) {
        if let Ok(mut script) = self.decompositions.lock() {
            script.push_back(Err(OvermindError::Llm(LlmError::InvalidResponse {
                provider: "scripted".to_string(),
                reason: message.to_string(),
            })));
        }
    }
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityClassifier for ScriptedClassifier {
    fn classify(&self, text: &str) -> OvermindResult<Vec<String>> {
        if let Ok(mut script) = self.classifications.lock() {
            if let Some(next) = script.pop_front() {
                return next;
            }
        }
        self.fallback.classify(text)
    }

    fn decompose(&self, description: &str) -> OvermindResult<String> {
        if let Ok(mut script) = self.decompositions.lock() {
            if let Some(next) = script.pop_front() {
                return next;
            }
        }
        self.fallback.decompose(description)
    }
}

impl std::fmt::Debug for ScriptedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedClassifier").finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams::new("test-model", 0.7, 256)
    }

    #[test]
    fn test_provider_registry_new_is_empty() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_text());
        assert!(!registry.has_classifier());
    }

    #[test]
    fn test_provider_registry_unconfigured_errors() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.text(),
            Err(OvermindError::Llm(LlmError::ProviderNotConfigured))
        ));
        assert!(matches!(
            registry.classifier(),
            Err(OvermindError::Llm(LlmError::ProviderNotConfigured))
        ));
    }

    #[test]
    fn test_provider_registry_register() {
        let mut registry = ProviderRegistry::new();
        registry.register_text(Arc::new(MockTextProvider::new()));
        registry.register_classifier(Arc::new(MockClassifier::new(vec![
            "conversation".to_string(),
        ])));
        assert!(registry.has_text());
        assert!(registry.has_classifier());
        assert!(registry.text().is_ok());
        assert!(registry.classifier().is_ok());
    }

    #[test]
    fn test_mock_text_provider_echoes_last_user_message() {
        let provider = MockTextProvider::new();
        let messages = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("ack"),
            ChatMessage::user("second"),
        ];
        let reply = provider.generate(&messages, "system", &params()).unwrap();
        assert!(reply.contains("second"));
        assert!(reply.contains("test-model"));
        assert!(!reply.contains("first"));
    }

    #[test]
    fn test_scripted_provider_plays_in_order() {
        let provider = ScriptedTextProvider::new();
        provider.push_ok("one");
        provider.push_err("quota exceeded");
        provider.push_ok("two");

        assert_eq!(provider.generate(&[], "", &params()).unwrap(), "one");
        let err = provider.generate(&[], "", &params()).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(provider.generate(&[], "", &params()).unwrap(), "two");
    }

    #[test]
    fn test_scripted_provider_exhaustion_fails() {
        let provider = ScriptedTextProvider::new();
        let err = provider.generate(&[], "", &params()).unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
    }

    #[test]
    fn test_mock_classifier_decompose_is_valid_json() {
        let classifier = MockClassifier::new(vec!["analysis".to_string()]);
        let plan = classifier.decompose("summarize the report").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&plan).unwrap();
        assert_eq!(parsed[0]["description"], "summarize the report");
        assert_eq!(parsed[0]["required_capabilities"][0], "analysis");
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The mock provider always produces a reply containing the model id
        /// and the last user message, regardless of conversation shape.
        #[test]
        fn prop_mock_provider_reply_contains_inputs(
            model in "[a-z-]{1,20}",
            content in "[a-zA-Z0-9 ]{1,80}"
        ) {
            let provider = MockTextProvider::new();
            let params = GenerationParams::new(&model, 0.5, 128);
            let messages = vec![ChatMessage::user(&content)];
            let reply = provider.generate(&messages, "sys", &params).unwrap();
            prop_assert!(reply.contains(&model));
            prop_assert!(reply.contains(&content));
        }

        /// Scripted responses come back in exactly the order they were queued.
        #[test]
        fn prop_scripted_provider_fifo(
            responses in prop::collection::vec("[a-z]{1,10}", 1..8)
        ) {
            let provider = ScriptedTextProvider::new();
            for response in &responses {
                provider.push_ok(response);
            }
            let params = GenerationParams::new("m", 0.0, 1);
            for expected in &responses {
                let got = provider.generate(&[], "", &params).unwrap();
                prop_assert_eq!(&got, expected);
            }
            prop_assert_eq!(provider.remaining(), 0);
        }
    }
}
