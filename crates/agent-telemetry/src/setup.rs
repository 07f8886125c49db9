//! One-call tracing setup for a Braintrust project

use crate::{
    BraintrustConfig, BraintrustSpanProcessor, CrewInstrumentor, Instrumentor, LlmInstrumentor,
    Result, TelemetryContext, TracerProvider,
};
use opentelemetry_sdk::trace::BatchConfigBuilder;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Project spans are sent to by default
pub const DEFAULT_PROJECT_NAME: &str = "SlavinScratchArea";

/// Default experiment name
pub const DEFAULT_EXPERIMENT_NAME: &str = "crewai-demo";

/// Braintrust API base URL
pub const DEFAULT_API_URL: &str = "https://api.braintrust.dev";

/// Inputs to [`setup_tracing`]
#[derive(Clone)]
pub struct TracingOptions {
    /// Braintrust project receiving the spans
    pub project_name: String,
    /// Accepted for parity with the project settings; not part of the parent tag
    pub experiment_name: String,
    /// Braintrust API key
    pub api_key: String,
    /// Braintrust API base URL
    pub api_url: String,
    /// Delay between scheduled batch exports
    pub scheduled_delay: Duration,
    /// HTTP timeout per export
    pub export_timeout: Duration,
}

impl TracingOptions {
    /// Default project and experiment with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            scheduled_delay: Duration::from_secs(5),
            export_timeout: Duration::from_secs(30),
        }
    }

    /// Set the project name
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    /// Set the experiment name
    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// Set the API base URL
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the delay between scheduled batch exports
    pub fn with_scheduled_delay(mut self, delay: Duration) -> Self {
        self.scheduled_delay = delay;
        self
    }

    /// Set the HTTP timeout per export
    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    /// Parent tag, `project_name:<project_name>`
    pub fn parent(&self) -> String {
        format!("project_name:{}", self.project_name)
    }

    fn processor_name(&self) -> String {
        format!("braintrust:{}", self.parent())
    }
}

impl fmt::Debug for TracingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingOptions")
            .field("project_name", &self.project_name)
            .field("experiment_name", &self.experiment_name)
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("scheduled_delay", &self.scheduled_delay)
            .field("export_timeout", &self.export_timeout)
            .finish()
    }
}

/// Wire the context's provider to Braintrust and instrument crew and LLM spans
///
/// The provider already installed in `telemetry` is reused; otherwise one is
/// created and installed. A processor for the same parent is attached only
/// once, so repeated calls do not export spans twice.
pub fn setup_tracing(
    telemetry: &TelemetryContext,
    options: TracingOptions,
) -> Result<Arc<TracerProvider>> {
    let reused = telemetry.provider().is_some();
    let provider = telemetry.get_or_install();
    if reused {
        debug!("Reusing installed tracer provider");
    }

    let parent = options.parent();
    debug!(
        experiment = %options.experiment_name,
        "Experiment name is not used for the parent tag"
    );

    let processor_name = options.processor_name();
    if provider.has_processor(&processor_name) {
        warn!("Span processor for {} already attached; skipping", parent);
    } else {
        let config = BraintrustConfig::new(options.api_key, options.api_url, parent.clone())
            .with_timeout(options.export_timeout);
        let batch = BatchConfigBuilder::default()
            .with_scheduled_delay(options.scheduled_delay)
            .build();
        provider.add_span_processor(processor_name, BraintrustSpanProcessor::new(&config, batch)?);
    }

    CrewInstrumentor.instrument(&provider);
    LlmInstrumentor.instrument(&provider);

    info!("Tracing to Braintrust parent {}", parent);
    Ok(provider)
}
