//! LLM provider abstraction layer
//!
//! This crate provides provider-agnostic abstractions for talking to chat
//! completion models:
//!
//! - Message types for LLM communication
//! - Completion request/response types
//! - The [`LLMProvider`] trait and the OpenAI implementation (behind the
//!   `openai` feature)
//! - [`Llm`], a provider bound to a model and its sampling settings, shared
//!   by every agent that uses it
//!
//! Every completion runs inside an `llm.chat` span under the `agent_llm`
//! target so the telemetry layer can pick it up.

pub mod completion;
pub mod error;
pub mod llm;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use llm::{DEFAULT_MODEL, Llm, LlmConfig};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
