//! OpenAI provider implementation
//!
//! Implements [`LLMProvider`] against the OpenAI chat completions API.
//! See: https://platform.openai.com/docs/api-reference/chat
//!
//! # Example
//!
//! ```no_run
//! use agent_llm::{CompletionRequest, Message, LLMProvider};
//! use agent_llm::providers::OpenAIProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAIProvider::from_env()?;
//!
//!     let request = CompletionRequest::builder("gpt-4o-mini")
//!         .add_message(Message::user("Name three small-cap equities."))
//!         .max_tokens(200)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.content);
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, Role,
    StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{Span, debug, field, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for OpenAI provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the OpenAI API (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from environment variables
    ///
    /// Reads the API key from `OPENAI_API_KEY` and, if set, the base URL from
    /// `OPENAI_API_BASE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                LLMError::ConfigurationError(
                    "OPENAI_API_KEY environment variable not set".to_string(),
                )
            })?;

        let mut config = Self::new(api_key);
        if let Some(base) = lookup("OPENAI_API_BASE").filter(|b| !b.is_empty()) {
            config.api_base = base;
        }
        Ok(config)
    }

    /// Set custom API base URL, e.g. for Azure OpenAI or a local gateway
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

/// OpenAI chat completions provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new OpenAI provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Create a provider from `OPENAI_API_KEY` / `OPENAI_API_BASE`
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(
        name = "llm.chat",
        skip(self, request),
        fields(
            gen_ai.system = "openai",
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.response.finish_reason = field::Empty,
            gen_ai.usage.prompt_tokens = field::Empty,
            gen_ai.usage.completion_tokens = field::Empty,
            braintrust.input_json = field::Empty,
            braintrust.output_json = field::Empty,
        )
    )]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to OpenAI API at {}", self.config.api_base);

        let messages = build_openai_messages(request.system.as_deref(), &request.messages);
        let span = Span::current();
        if let Ok(input) = serde_json::to_string(&messages) {
            span.record("braintrust.input_json", input.as_str());
        }

        let openai_request = OpenAIRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stop: request.stop_sequences.as_deref(),
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&openai_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 => LLMError::AuthenticationFailed,
                429 => LLMError::RateLimitExceeded(error_text),
                400 => LLMError::InvalidRequest(error_text),
                404 => LLMError::ModelNotFound(request.model),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let body: OpenAIResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let completion = into_completion(body)?;

        span.record(
            "gen_ai.response.finish_reason",
            field::debug(completion.stop_reason),
        );
        span.record("gen_ai.usage.prompt_tokens", completion.usage.input_tokens);
        span.record(
            "gen_ai.usage.completion_tokens",
            completion.usage.output_tokens,
        );
        span.record("braintrust.output_json", completion.message.content.as_str());

        debug!(
            "Received response - stop_reason: {:?}, tokens: {}/{}",
            completion.stop_reason, completion.usage.input_tokens, completion.usage.output_tokens
        );

        Ok(completion)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// ============================================================================
// Conversion functions
// ============================================================================

/// System prompt goes first in the messages array for OpenAI
fn build_openai_messages<'a>(
    system: Option<&'a str>,
    messages: &'a [Message],
) -> Vec<OpenAIMessage<'a>> {
    system
        .map(|content| OpenAIMessage {
            role: Role::System.as_str(),
            content,
        })
        .into_iter()
        .chain(messages.iter().map(|msg| OpenAIMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        }))
        .collect()
}

fn into_completion(body: OpenAIResponse) -> Result<CompletionResponse> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

    let usage = body
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        message: Message::assistant(choice.message.content.unwrap_or_default()),
        stop_reason: map_stop_reason(choice.finish_reason.as_deref().unwrap_or("stop")),
        usage,
    })
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::ContentFilter,
        other => {
            debug!("Unknown stop reason: {}", other);
            StopReason::EndTurn
        }
    }
}
