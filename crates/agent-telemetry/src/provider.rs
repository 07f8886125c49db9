//! Tracer provider and the context that owns it

use crate::processor::{ProcessorFanOut, ProcessorRegistry};
use crate::{InstrumentedTargets, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{SdkTracerProvider, SpanProcessor};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{Metadata, debug};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{Layer, Registry};

const TRACER_NAME: &str = "agent-telemetry";
const DEFAULT_SERVICE_NAME: &str = "agent-crew";

/// SDK tracer provider whose processors can be attached at any time
///
/// Which `tracing` spans reach it is decided by the instrumented target set,
/// filled in by [`Instrumentor`](crate::Instrumentor)s.
pub struct TracerProvider {
    sdk: SdkTracerProvider,
    registry: Arc<ProcessorRegistry>,
    targets: InstrumentedTargets,
}

impl TracerProvider {
    /// Provider with no processors and nothing instrumented
    pub fn new(resource: Resource) -> Self {
        let registry = Arc::new(ProcessorRegistry::new(resource.clone()));
        let sdk = SdkTracerProvider::builder()
            .with_span_processor(ProcessorFanOut(Arc::clone(&registry)))
            .with_resource(resource)
            .build();

        Self {
            sdk,
            registry,
            targets: InstrumentedTargets::default(),
        }
    }

    /// Attach a processor under `name`
    pub fn add_span_processor(&self, name: impl Into<String>, processor: impl SpanProcessor + 'static) {
        let name = name.into();
        debug!("Attaching span processor {}", name);
        self.registry.add(name, Box::new(processor));
    }

    /// Number of attached processors
    pub fn processor_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether a processor named `name` is attached
    pub fn has_processor(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Targets whose spans are exported
    pub fn targets(&self) -> &InstrumentedTargets {
        &self.targets
    }

    /// `tracing` layer feeding instrumented spans into this provider
    ///
    /// Spans and events from other targets are ignored; a captured span's
    /// parent is its nearest captured ancestor.
    pub fn layer(&self) -> impl Layer<Registry> + Send + Sync + use<> {
        let targets = self.targets.clone();
        tracing_opentelemetry::layer()
            .with_tracer(self.sdk.tracer(TRACER_NAME))
            .with_filter(filter_fn(move |metadata: &Metadata<'_>| {
                targets.matches(metadata.target())
            }))
    }

    /// Export everything processed so far
    pub fn force_flush(&self) -> Result<()> {
        Ok(self.sdk.force_flush()?)
    }

    /// Flush and stop every processor
    pub fn shutdown(&self) -> Result<()> {
        Ok(self.sdk.shutdown()?)
    }

    #[cfg(test)]
    pub(crate) fn sdk(&self) -> &SdkTracerProvider {
        &self.sdk
    }
}

impl Default for TracerProvider {
    fn default() -> Self {
        Self::new(service_resource(DEFAULT_SERVICE_NAME))
    }
}

impl fmt::Debug for TracerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerProvider")
            .field("processors", &self.processor_count())
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

fn service_resource(service_name: impl Into<String>) -> Resource {
    Resource::builder()
        .with_service_name(service_name.into())
        .build()
}

/// Owner of the process tracer provider
///
/// Construct one at startup and pass it by reference. The provider is
/// created at most once per context; later requests get the same instance.
#[derive(Debug)]
pub struct TelemetryContext {
    resource: Resource,
    provider: OnceLock<Arc<TracerProvider>>,
}

impl Default for TelemetryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryContext {
    /// Context whose provider describes the default service
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE_NAME)
    }

    /// Context whose provider reports `service.name` as `service_name`
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self::with_resource(service_resource(service_name))
    }

    /// Context that creates its provider with `resource`
    pub fn with_resource(resource: Resource) -> Self {
        Self {
            resource,
            provider: OnceLock::new(),
        }
    }

    /// Installed provider, if any
    pub fn provider(&self) -> Option<Arc<TracerProvider>> {
        self.provider.get().cloned()
    }

    /// Installed provider, creating and installing one first if needed
    pub fn get_or_install(&self) -> Arc<TracerProvider> {
        Arc::clone(
            self.provider
                .get_or_init(|| Arc::new(TracerProvider::new(self.resource.clone()))),
        )
    }

    /// Export layer for the context's provider
    pub fn layer(&self) -> impl Layer<Registry> + Send + Sync + use<> {
        self.get_or_install().layer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::trace::{BatchConfig, BatchSpanProcessor, InMemorySpanExporter};
    use tracing_subscriber::layer::SubscriberExt;

    fn memory_processor(exporter: &InMemorySpanExporter) -> BatchSpanProcessor {
        BatchSpanProcessor::builder(exporter.clone())
            .with_batch_config(BatchConfig::default())
            .build()
    }

    #[test]
    fn test_context_installs_once() {
        let ctx = TelemetryContext::new();
        assert!(ctx.provider().is_none());

        let first = ctx.get_or_install();
        let second = ctx.get_or_install();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&ctx.provider().unwrap(), &first));
    }

    #[test]
    fn test_layer_installs_provider() {
        let ctx = TelemetryContext::with_service_name("etf-crew");
        let _layer = ctx.layer();
        assert!(ctx.provider().is_some());
    }

    #[test]
    fn test_fan_out_to_processors_added_after_build() {
        let provider = TracerProvider::default();
        let a = InMemorySpanExporter::default();
        let b = InMemorySpanExporter::default();
        provider.add_span_processor("a", memory_processor(&a));
        provider.add_span_processor("b", memory_processor(&b));
        assert_eq!(provider.processor_count(), 2);
        assert!(provider.has_processor("a"));
        assert!(!provider.has_processor("c"));

        provider.sdk.tracer("test").start("crew.task").end();
        provider.force_flush().unwrap();

        assert_eq!(a.get_finished_spans().unwrap().len(), 1);
        assert_eq!(b.get_finished_spans().unwrap().len(), 1);
        provider.shutdown().unwrap();
    }

    #[test]
    fn test_layer_exports_only_instrumented_targets() {
        let provider = TracerProvider::default();
        let exporter = InMemorySpanExporter::default();
        provider.add_span_processor("memory", memory_processor(&exporter));
        provider.targets().enable("agent_crew");

        let subscriber = tracing_subscriber::registry().with(provider.layer());
        tracing::subscriber::with_default(subscriber, || {
            let kickoff = tracing::info_span!(target: "agent_crew::crew", "crew.kickoff");
            let _kickoff = kickoff.enter();
            let noise = tracing::info_span!(target: "hyper::client", "noise");
            let _noise = noise.enter();
            tracing::info_span!(target: "agent_crew::agent", "agent.execute_task", agent.role = "Analyst")
                .in_scope(|| tracing::info!(target: "agent_crew::agent", "working"));
        });
        provider.force_flush().unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        let names: Vec<&str> = spans.iter().map(|s| &*s.name).collect();
        assert_eq!(names.len(), 2, "{names:?}");
        assert!(!names.contains(&"noise"));

        let kickoff = spans.iter().find(|s| s.name == "crew.kickoff").unwrap();
        let agent = spans.iter().find(|s| s.name == "agent.execute_task").unwrap();
        assert_eq!(agent.parent_span_id, kickoff.span_context.span_id());
        assert_eq!(
            agent.span_context.trace_id(),
            kickoff.span_context.trace_id()
        );
        assert!(
            agent
                .attributes
                .iter()
                .any(|kv| kv.key.as_str() == "agent.role" && kv.value.as_str() == "Analyst")
        );
    }
}
