//! Trace capture and export for agent pipelines
//!
//! Spans emitted with `tracing` by instrumented crates are bridged into an
//! OpenTelemetry [`TracerProvider`] by its [`layer`](TracerProvider::layer),
//! batched by a [`BraintrustSpanProcessor`], and shipped to Braintrust over
//! OTLP/HTTP.
//!
//! The provider is not ambient global state: it lives in a
//! [`TelemetryContext`] that the binary creates once and passes by reference
//! to whoever needs it. Initialising through the context reuses an installed
//! provider instead of replacing it.
//!
//! ```no_run
//! use agent_telemetry::{TelemetryContext, TracingOptions, setup_tracing};
//!
//! # fn example() -> agent_telemetry::Result<()> {
//! let telemetry = TelemetryContext::new();
//! let provider = setup_tracing(&telemetry, TracingOptions::new("bt-key"))?;
//! // ... run instrumented work ...
//! provider.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod braintrust;
pub mod error;
pub mod instrument;
mod processor;
pub mod provider;
pub mod setup;

pub use braintrust::{BraintrustConfig, BraintrustSpanProcessor, PARENT_ATTRIBUTE};
pub use error::{Result, TelemetryError};
pub use instrument::{CrewInstrumentor, InstrumentedTargets, Instrumentor, LlmInstrumentor};
pub use opentelemetry_sdk::Resource;
pub use provider::{TelemetryContext, TracerProvider};
pub use setup::{
    DEFAULT_API_URL, DEFAULT_EXPERIMENT_NAME, DEFAULT_PROJECT_NAME, TracingOptions, setup_tracing,
};
