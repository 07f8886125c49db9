//! Error types for agent-crew

use crate::TaskId;
use agent_llm::LLMError;
use thiserror::Error;

/// Result type alias for agent-crew
pub type Result<T> = std::result::Result<T, CrewError>;

/// Errors raised while building or running a crew
#[derive(Error, Debug)]
pub enum CrewError {
    /// Agent definition rejected by its builder
    #[error("Invalid agent: {0}")]
    InvalidAgent(String),

    /// Task definition rejected by its builder
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Two tasks share an id
    #[error("Duplicate task id: {0}")]
    DuplicateTask(TaskId),

    /// A task names an upstream task that is not in the crew
    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    /// Task dependencies loop back on themselves
    #[error("Task dependencies form a cycle through {0}")]
    DependencyCycle(TaskId),

    /// A task depends on a task scheduled after it
    #[error("Task {task} depends on {dependency}, which runs after it")]
    DependencyOrder { task: TaskId, dependency: TaskId },

    /// A task is assigned to an agent the crew does not have
    #[error("Task {task} is assigned to agent '{role}', which is not part of the crew")]
    UnknownAgent { task: TaskId, role: String },

    /// Prompt template failed to render
    #[error("Prompt rendering failed: {0}")]
    Prompt(#[from] minijinja::Error),

    /// Completion call failed
    #[error(transparent)]
    Llm(#[from] LLMError),

    /// Prompt does not fit the model's context window
    #[error("Prompt needs about {needed} tokens but the context window allows {available}")]
    ContextWindowExceeded { needed: usize, available: usize },
}
