//! Role-playing agents working through a crew of dependent tasks
//!
//! An [`AgentSpec`] binds a role, goal, and backstory to an [`agent_llm::Llm`].
//! A [`TaskSpec`] gives one agent a description and the expected shape of its
//! answer, and may name upstream tasks whose output it needs. A [`Crew`]
//! validates the resulting [`TaskGraph`] and runs the tasks through its
//! [`Orchestrator::kickoff`].
//!
//! Kickoff, task, and agent execution each run in a span under the
//! `agent_crew` target.

pub mod agent;
pub mod context;
pub mod crew;
pub mod error;
pub mod graph;
pub mod prompts;
pub mod task;

#[cfg(test)]
mod testing;

pub use agent::{AgentFlags, AgentSpec, AgentSpecBuilder};
pub use context::Context;
pub use crew::{Crew, CrewBuilder, CrewOutput, Orchestrator, Process};
pub use error::{CrewError, Result};
pub use graph::{DependencyKind, TaskGraph};
pub use task::{TaskContext, TaskId, TaskOutput, TaskSpec, TaskSpecBuilder};
