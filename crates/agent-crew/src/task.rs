//! Tasks and their outputs

use crate::{AgentSpec, CrewError, Result};
use agent_llm::TokenUsage;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identifier of a task within a crew
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which earlier outputs a task receives
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskContext {
    /// Every task that runs before this one
    #[default]
    Implicit,

    /// Exactly these tasks, in this order
    Explicit(Vec<TaskId>),
}

/// A unit of work assigned to one agent
#[derive(Debug, Clone)]
pub struct TaskSpec {
    id: TaskId,
    description: String,
    expected_output: String,
    agent: Arc<AgentSpec>,
    context: TaskContext,
}

impl TaskSpec {
    /// Start building a task with the given id
    pub fn builder(id: impl Into<TaskId>) -> TaskSpecBuilder {
        TaskSpecBuilder {
            id: id.into(),
            description: None,
            expected_output: None,
            agent: None,
            context: TaskContext::Implicit,
        }
    }

    /// Task id
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// What to do
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Shape of the expected answer
    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    /// Assigned agent
    pub fn agent(&self) -> &Arc<AgentSpec> {
        &self.agent
    }

    /// Upstream tasks this task reads
    pub fn context(&self) -> &TaskContext {
        &self.context
    }
}

/// Builder for [`TaskSpec`]
#[derive(Debug)]
pub struct TaskSpecBuilder {
    id: TaskId,
    description: Option<String>,
    expected_output: Option<String>,
    agent: Option<Arc<AgentSpec>>,
    context: TaskContext,
}

impl TaskSpecBuilder {
    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the expected output
    pub fn expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = Some(expected_output.into());
        self
    }

    /// Assign the agent
    pub fn agent(mut self, agent: Arc<AgentSpec>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Read the output of these tasks, in order
    pub fn context(self, upstream: &[&TaskSpec]) -> Self {
        self.context_ids(upstream.iter().map(|task| task.id.clone()))
    }

    /// Read the output of the tasks with these ids, in order
    pub fn context_ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.context = TaskContext::Explicit(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<TaskSpec> {
        let id = self.id;
        if id.as_str().trim().is_empty() {
            return Err(CrewError::InvalidTask("task id must not be empty".to_string()));
        }
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| CrewError::InvalidTask(format!("task {id} has no description")))?;
        let expected_output = self
            .expected_output
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| CrewError::InvalidTask(format!("task {id} has no expected output")))?;
        let agent = self
            .agent
            .ok_or_else(|| CrewError::InvalidTask(format!("task {id} has no agent")))?;

        Ok(TaskSpec {
            id,
            description,
            expected_output,
            agent,
            context: self.context,
        })
    }
}

/// Result of one task
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutput {
    /// Task that produced it
    pub task_id: TaskId,
    /// Role of the agent that answered
    pub agent_role: String,
    /// Task description
    pub description: String,
    /// The agent's final answer
    pub raw: String,
    /// Tokens spent
    pub usage: TokenUsage,
}

impl fmt::Display for TaskOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
