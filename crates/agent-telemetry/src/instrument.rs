//! Automatic instrumentation of the crew and LLM crates
//!
//! Both crates already describe their work with `#[instrument]` spans. An
//! instrumentor switches export on for a crate's targets, so nothing at the
//! call site has to create spans by hand.

use crate::TracerProvider;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// `tracing` targets whose spans reach the tracer provider
///
/// A target matches itself and its submodules: `agent_crew` covers
/// `agent_crew::crew` but not `agent_crewmate`.
#[derive(Debug, Clone, Default)]
pub struct InstrumentedTargets(Arc<RwLock<BTreeSet<String>>>);

impl InstrumentedTargets {
    /// Start matching `target`; false when it already matched
    pub fn enable(&self, target: impl Into<String>) -> bool {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target.into())
    }

    /// Stop matching `target`
    pub fn disable(&self, target: &str) -> bool {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target)
    }

    /// Whether `target` falls under an enabled target
    pub fn matches(&self, target: &str) -> bool {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|enabled| {
                target
                    .strip_prefix(enabled.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
            })
    }
}

/// Enables span export for a library's `tracing` targets
pub trait Instrumentor {
    /// Targets (crate or module paths) whose spans get exported
    fn targets(&self) -> &'static [&'static str];

    /// Start exporting spans from [`targets`](Self::targets)
    fn instrument(&self, provider: &TracerProvider) {
        for target in self.targets() {
            if provider.targets().enable(*target) {
                debug!("Instrumented {}", target);
            }
        }
    }

    /// Stop exporting spans from [`targets`](Self::targets)
    fn uninstrument(&self, provider: &TracerProvider) {
        for target in self.targets() {
            provider.targets().disable(target);
        }
    }

    /// Whether every target is currently exported
    fn is_instrumented(&self, provider: &TracerProvider) -> bool {
        self.targets().iter().all(|t| provider.targets().matches(t))
    }
}

/// Exports crew kickoff, task, and agent execution spans
#[derive(Debug, Clone, Copy, Default)]
pub struct CrewInstrumentor;

impl Instrumentor for CrewInstrumentor {
    fn targets(&self) -> &'static [&'static str] {
        &["agent_crew"]
    }
}

/// Exports LLM completion spans
#[derive(Debug, Clone, Copy, Default)]
pub struct LlmInstrumentor;

impl Instrumentor for LlmInstrumentor {
    fn targets(&self) -> &'static [&'static str] {
        &["agent_llm"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_matching() {
        let targets = InstrumentedTargets::default();
        assert!(targets.enable("agent_crew"));
        assert!(!targets.enable("agent_crew"));

        assert!(targets.matches("agent_crew"));
        assert!(targets.matches("agent_crew::crew"));
        assert!(!targets.matches("agent_crewmate"));
        assert!(!targets.matches("agent_llm"));

        assert!(targets.disable("agent_crew"));
        assert!(!targets.matches("agent_crew::crew"));
    }

    #[test]
    fn test_instrument_and_uninstrument() {
        let provider = TracerProvider::default();
        assert!(!CrewInstrumentor.is_instrumented(&provider));

        CrewInstrumentor.instrument(&provider);
        assert!(CrewInstrumentor.is_instrumented(&provider));
        assert!(provider.targets().matches("agent_crew::crew"));
        assert!(!LlmInstrumentor.is_instrumented(&provider));

        LlmInstrumentor.instrument(&provider);
        assert!(provider.targets().matches("agent_llm::providers::openai"));

        CrewInstrumentor.uninstrument(&provider);
        assert!(!provider.targets().matches("agent_crew::crew"));
        assert!(LlmInstrumentor.is_instrumented(&provider));
    }
}
