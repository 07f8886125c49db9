//! Model binding shared by agents
//!
//! An [`Llm`] pairs a provider with the model and sampling settings every
//! agent bound to it uses. Agents hold it behind an `Arc`, so two agents
//! configured with the same `Llm` hit the same provider client.

use crate::{CompletionRequest, CompletionResponse, LLMProvider, Message, Result};
use std::fmt;
use std::sync::Arc;

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Fallback context window when the model is not in the known table
const DEFAULT_CONTEXT_WINDOW: usize = 8_192;

/// Context windows of models the crew is commonly run against
const KNOWN_CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("gpt-4o-mini", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
];

/// Model and sampling settings
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Sampling temperature; provider default when `None`
    pub temperature: Option<f32>,

    /// Maximum tokens to generate per call
    pub max_tokens: usize,

    /// Context window override in tokens
    pub context_window: Option<usize>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: 4096,
            context_window: None,
        }
    }
}

impl LlmConfig {
    /// Config for the given model with default settings
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens per call
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the context window
    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = Some(tokens);
        self
    }
}

/// A provider bound to a model configuration
#[derive(Clone)]
pub struct Llm {
    provider: Arc<dyn LLMProvider>,
    config: LlmConfig,
}

impl Llm {
    /// Bind a provider to a model configuration
    pub fn new(provider: Arc<dyn LLMProvider>, config: LlmConfig) -> Self {
        Self { provider, config }
    }

    /// Model identifier
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Full configuration
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Context window size in tokens
    ///
    /// An explicit override wins, then the known-model table (longest prefix
    /// match, so dated snapshots resolve to their family), then 8192.
    pub fn context_window_size(&self) -> usize {
        if let Some(tokens) = self.config.context_window {
            return tokens;
        }
        KNOWN_CONTEXT_WINDOWS
            .iter()
            .filter(|(name, _)| self.config.model.starts_with(name))
            .max_by_key(|(name, _)| name.len())
            .map_or(DEFAULT_CONTEXT_WINDOW, |(_, tokens)| *tokens)
    }

    /// Run one completion with the bound settings
    pub async fn call(&self, system: &str, messages: Vec<Message>) -> Result<CompletionResponse> {
        let request = CompletionRequest::builder(&self.config.model)
            .system(system)
            .messages(messages)
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .build();

        self.provider.complete(request).await
    }
}

impl fmt::Debug for Llm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Llm")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}
