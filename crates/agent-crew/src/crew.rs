//! Crew definition and kickoff

use crate::{AgentSpec, Context, CrewError, Result, TaskGraph, TaskId, TaskOutput, TaskSpec};
use agent_llm::TokenUsage;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{Span, debug, info, instrument};
use uuid::Uuid;

/// Separator between upstream outputs in a task's context block
const CONTEXT_SEPARATOR: &str = "\n\n----------\n\n";

/// How a crew schedules its tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Process {
    /// One task at a time, in list order
    #[default]
    Sequential,
}

/// Runs a crew of agents to completion
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Run every task and return the final result
    async fn kickoff(&self) -> Result<CrewOutput>;
}

/// Result of a kickoff
#[derive(Debug, Clone, Serialize)]
pub struct CrewOutput {
    /// Output of the last task
    pub raw: String,
    /// Output of every task, in execution order
    pub tasks_output: Vec<TaskOutput>,
    /// Tokens spent across all tasks
    pub token_usage: TokenUsage,
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Agents and the tasks they work through
///
/// # Example
///
/// ```no_run
/// use agent_crew::{AgentSpec, Crew, Orchestrator, Process, TaskSpec};
/// use std::sync::Arc;
///
/// # async fn example(analyst: Arc<AgentSpec>, writer: Arc<AgentSpec>) -> agent_crew::Result<()> {
/// let research = TaskSpec::builder("research")
///     .description("Research stocks that fit the thesis")
///     .expected_output("A detailed report")
///     .agent(analyst.clone())
///     .build()?;
/// let write = TaskSpec::builder("write")
///     .description("Pick 20 stocks")
///     .expected_output("A list of 20 stocks")
///     .agent(writer.clone())
///     .context(&[&research])
///     .build()?;
///
/// let crew = Crew::builder()
///     .agents(vec![analyst, writer])
///     .tasks(vec![research, write])
///     .process(Process::Sequential)
///     .build()?;
///
/// println!("{}", crew.kickoff().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Crew {
    agents: Vec<Arc<AgentSpec>>,
    tasks: Vec<TaskSpec>,
    graph: TaskGraph,
    process: Process,
    verbose: bool,
}

impl Crew {
    /// Start building a crew
    pub fn builder() -> CrewBuilder {
        CrewBuilder::default()
    }

    /// Member agents
    pub fn agents(&self) -> &[Arc<AgentSpec>] {
        &self.agents
    }

    /// Tasks in list order
    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Validated task dependencies
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Scheduling process
    pub fn process(&self) -> Process {
        self.process
    }

    fn task(&self, id: &TaskId) -> Option<&TaskSpec> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    async fn run_sequential(&self, run_id: &str) -> Result<Vec<TaskOutput>> {
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());
        let mut by_id: HashMap<TaskId, usize> = HashMap::new();

        for id in self.graph.execution_order() {
            let task = self
                .task(id)
                .ok_or_else(|| CrewError::InvalidTask(format!("task {id} is not in the crew")))?;

            let mut upstream = Vec::new();
            for dep in self.graph.upstream(id) {
                let position = by_id.get(dep).ok_or_else(|| CrewError::DependencyOrder {
                    task: id.clone(),
                    dependency: dep.clone(),
                })?;
                if let Some(kind) = self.graph.dependency_kind(dep, id) {
                    debug!("Task {} reads {} ({} dependency)", id, dep, kind);
                }
                upstream.push(outputs[*position].raw.as_str());
            }

            let mut context = Context::new().with_run_id(run_id);
            if !upstream.is_empty() {
                context = context.with_upstream_output(upstream.join(CONTEXT_SEPARATOR));
            }

            let output = self.run_task(task, &context).await?;
            by_id.insert(id.clone(), outputs.len());
            outputs.push(output);
        }

        Ok(outputs)
    }

    #[instrument(
        name = "crew.task",
        skip(self, task, context),
        fields(task.id = %task.id(), task.agent = %task.agent().role())
    )]
    async fn run_task(&self, task: &TaskSpec, context: &Context) -> Result<TaskOutput> {
        if self.verbose {
            info!("Starting task {}", task.id());
        } else {
            debug!("Starting task {}", task.id());
        }
        task.agent().execute_task(task, context).await
    }
}

#[async_trait]
impl Orchestrator for Crew {
    #[instrument(
        name = "crew.kickoff",
        skip(self),
        fields(
            crew.process = ?self.process,
            crew.tasks = self.tasks.len(),
            crew.run_id = tracing::field::Empty,
            gen_ai.usage.total_tokens = tracing::field::Empty,
        )
    )]
    async fn kickoff(&self) -> Result<CrewOutput> {
        let run_id = Uuid::new_v4().to_string();
        Span::current().record("crew.run_id", run_id.as_str());
        if self.verbose {
            info!("Crew kickoff with {} tasks", self.tasks.len());
        }

        let tasks_output = match self.process {
            Process::Sequential => self.run_sequential(&run_id).await?,
        };

        let token_usage = tasks_output
            .iter()
            .fold(TokenUsage::default(), |total, output| total + output.usage);
        Span::current().record("gen_ai.usage.total_tokens", token_usage.total());

        let raw = tasks_output
            .last()
            .map(|output| output.raw.clone())
            .unwrap_or_default();

        Ok(CrewOutput {
            raw,
            tasks_output,
            token_usage,
        })
    }
}

/// Builder for [`Crew`]
#[derive(Debug, Default)]
pub struct CrewBuilder {
    agents: Vec<Arc<AgentSpec>>,
    tasks: Vec<TaskSpec>,
    process: Process,
    verbose: bool,
}

impl CrewBuilder {
    /// Set the member agents
    pub fn agents(mut self, agents: Vec<Arc<AgentSpec>>) -> Self {
        self.agents = agents;
        self
    }

    /// Add one agent
    pub fn agent(mut self, agent: Arc<AgentSpec>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Set the tasks, in execution order
    pub fn tasks(mut self, tasks: Vec<TaskSpec>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Append one task
    pub fn task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    /// Set the scheduling process
    pub fn process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    /// Log kickoff and task starts at `info`
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Validate membership and dependencies, then build
    pub fn build(self) -> Result<Crew> {
        if self.tasks.is_empty() {
            return Err(CrewError::InvalidTask("a crew needs at least one task".to_string()));
        }

        for task in &self.tasks {
            let member = self
                .agents
                .iter()
                .any(|agent| Arc::ptr_eq(agent, task.agent()));
            if !member {
                return Err(CrewError::UnknownAgent {
                    task: task.id().clone(),
                    role: task.agent().role().to_string(),
                });
            }
        }

        let graph = TaskGraph::from_tasks(&self.tasks)?;

        Ok(Crew {
            agents: self.agents,
            tasks: self.tasks,
            graph,
            process: self.process,
            verbose: self.verbose,
        })
    }
}
