//! Named span processors that can be attached after the provider is built
//!
//! The SDK fixes a provider's processors at build time. The provider here is
//! built once with a single [`ProcessorFanOut`], and every processor attached
//! later goes into the shared [`ProcessorRegistry`] behind it.

use opentelemetry::Context;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{Span, SpanData, SpanProcessor};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug)]
struct NamedProcessor {
    name: String,
    processor: Box<dyn SpanProcessor>,
}

/// Processors attached to a provider, keyed by name
#[derive(Debug)]
pub(crate) struct ProcessorRegistry {
    processors: RwLock<Vec<NamedProcessor>>,
    resource: RwLock<Resource>,
}

impl ProcessorRegistry {
    /// Empty registry describing spans with `resource`
    pub(crate) fn new(resource: Resource) -> Self {
        Self {
            processors: RwLock::new(Vec::new()),
            resource: RwLock::new(resource),
        }
    }

    /// Attach `processor` under `name`
    ///
    /// The processor is given the provider's resource before it sees a span.
    pub(crate) fn add(&self, name: impl Into<String>, mut processor: Box<dyn SpanProcessor>) {
        processor.set_resource(&self.resource.read().unwrap_or_else(PoisonError::into_inner));
        self.processors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(NamedProcessor {
                name: name.into(),
                processor,
            });
    }

    /// Whether a processor named `name` is attached
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p.name == name)
    }

    /// Number of attached processors
    pub(crate) fn len(&self) -> usize {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn each(&self, mut f: impl FnMut(&dyn SpanProcessor) -> OTelSdkResult) -> OTelSdkResult {
        let results: Vec<OTelSdkResult> = self
            .processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| f(p.processor.as_ref()))
            .collect();
        results.into_iter().collect()
    }
}

/// The one processor the SDK provider holds; forwards to the registry
#[derive(Debug)]
pub(crate) struct ProcessorFanOut(pub(crate) Arc<ProcessorRegistry>);

impl SpanProcessor for ProcessorFanOut {
    fn on_start(&self, span: &mut Span, cx: &Context) {
        for p in self
            .0
            .processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            p.processor.on_start(span, cx);
        }
    }

    fn on_end(&self, span: SpanData) {
        let processors = self
            .0
            .processors
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some((last, rest)) = processors.split_last() {
            for p in rest {
                p.processor.on_end(span.clone());
            }
            last.processor.on_end(span);
        }
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.0.each(|p| p.force_flush())
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> OTelSdkResult {
        self.0.each(|p| p.shutdown_with_timeout(timeout))
    }

    fn set_resource(&mut self, resource: &Resource) {
        *self
            .0
            .resource
            .write()
            .unwrap_or_else(PoisonError::into_inner) = resource.clone();
        for p in self
            .0
            .processors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_mut()
        {
            p.processor.set_resource(resource);
        }
    }
}
