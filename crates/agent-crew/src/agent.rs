//! Role-playing agents bound to an LLM

use crate::{Context, CrewError, Result, TaskOutput, TaskSpec, prompts};
use agent_llm::{Llm, Message};
use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use std::sync::Arc;
use tracing::{Span, debug, field, info, instrument, warn};

/// Rough characters-per-token ratio used to size prompts
const CHARS_PER_TOKEN: usize = 4;

/// Share of the context window a prompt may use, in percent
const CONTEXT_WINDOW_USAGE: usize = 85;

/// Behaviour switches for an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentFlags {
    /// Append the current date to every task prompt
    pub inject_date: bool,

    /// Trim upstream context to fit the model instead of failing
    pub respect_context_window: bool,

    /// strftime format for the injected date
    pub date_format: String,

    /// Log task starts and final answers at `info` instead of `debug`
    pub verbose: bool,
}

impl Default for AgentFlags {
    fn default() -> Self {
        Self {
            inject_date: false,
            respect_context_window: true,
            date_format: "%Y-%m-%d".to_string(),
            verbose: false,
        }
    }
}

/// An agent with a role, a goal, and a backstory, answering through an LLM
///
/// Immutable once built. Several agents may share one [`Llm`].
#[derive(Debug, Clone)]
pub struct AgentSpec {
    role: String,
    goal: String,
    backstory: String,
    llm: Arc<Llm>,
    flags: AgentFlags,
}

impl AgentSpec {
    /// Start building an agent
    pub fn builder() -> AgentSpecBuilder {
        AgentSpecBuilder::default()
    }

    /// Role, also used as the agent's name
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Personal goal
    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Backstory
    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    /// Bound model
    pub fn llm(&self) -> &Arc<Llm> {
        &self.llm
    }

    /// Behaviour switches
    pub fn flags(&self) -> &AgentFlags {
        &self.flags
    }

    /// Rendered system prompt
    pub fn system_prompt(&self) -> Result<String> {
        prompts::system_prompt(&self.role, &self.backstory, &self.goal)
    }

    /// Work on `task`, reading upstream output and the date from `context`
    #[instrument(
        name = "agent.execute_task",
        skip(self, task, context),
        fields(
            agent.role = %self.role,
            task.id = %task.id(),
            gen_ai.request.model = %self.llm.model(),
            crew.run_id = field::Empty,
        )
    )]
    pub async fn execute_task(&self, task: &TaskSpec, context: &Context) -> Result<TaskOutput> {
        if let Some(run_id) = context.run_id() {
            Span::current().record("crew.run_id", run_id);
        }
        if self.flags.verbose {
            info!("Agent {} started task: {}", self.role, task.description());
        } else {
            debug!("Agent {} started task: {}", self.role, task.description());
        }

        let system = self.system_prompt()?;
        let date = self.current_date(context);
        let prompt = self.fit_prompt(
            &system,
            task.description(),
            Some(task.expected_output()),
            context.upstream_output(),
            date.as_deref(),
        )?;

        let response = self.llm.call(&system, vec![Message::user(prompt)]).await?;
        let raw = response.message.text().unwrap_or_default().to_string();

        if self.flags.verbose {
            info!("Agent {} final answer:\n{}", self.role, raw);
        } else {
            debug!("Agent {} final answer:\n{}", self.role, raw);
        }

        Ok(TaskOutput {
            task_id: task.id().clone(),
            agent_role: self.role.clone(),
            description: task.description().to_string(),
            raw,
            usage: response.usage,
        })
    }

    fn current_date(&self, context: &Context) -> Option<String> {
        if !self.flags.inject_date {
            return None;
        }
        let date = context.current_date().map_or_else(
            || Local::now().format(&self.flags.date_format).to_string(),
            str::to_string,
        );
        Some(date)
    }

    /// Render the task prompt, trimming upstream context when the whole
    /// exchange would exceed the usable part of the context window
    fn fit_prompt(
        &self,
        system: &str,
        description: &str,
        expected_output: Option<&str>,
        upstream: Option<&str>,
        date: Option<&str>,
    ) -> Result<String> {
        let available = self.llm.context_window_size() * CONTEXT_WINDOW_USAGE / 100;
        let system_chars = system.chars().count();

        let prompt = prompts::task_prompt(description, expected_output, upstream, date)?;
        let needed = estimate_tokens(system_chars + prompt.chars().count());
        if needed <= available {
            return Ok(prompt);
        }

        let exceeded = CrewError::ContextWindowExceeded { needed, available };
        let Some(upstream) = upstream.filter(|_| self.flags.respect_context_window) else {
            return Err(exceeded);
        };

        let overhead = system_chars
            + prompts::task_prompt(description, expected_output, Some(""), date)?
                .chars()
                .count();
        let allowed = (available * CHARS_PER_TOKEN).saturating_sub(overhead);
        if allowed == 0 {
            return Err(exceeded);
        }

        warn!(
            needed,
            available,
            "Prompt for {} exceeds the context window; trimming context to {} characters",
            self.role,
            allowed
        );
        let trimmed: String = upstream.chars().take(allowed).collect();
        prompts::task_prompt(description, expected_output, Some(&trimmed), date)
    }
}

fn estimate_tokens(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Builder for [`AgentSpec`]
#[derive(Debug, Default)]
pub struct AgentSpecBuilder {
    role: Option<String>,
    goal: Option<String>,
    backstory: Option<String>,
    llm: Option<Arc<Llm>>,
    flags: AgentFlags,
}

impl AgentSpecBuilder {
    /// Set the role
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the goal
    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    /// Set the backstory
    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = Some(backstory.into());
        self
    }

    /// Set the model
    pub fn llm(mut self, llm: Arc<Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Replace all flags
    pub fn flags(mut self, flags: AgentFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Append the current date to task prompts
    pub fn inject_date(mut self, inject: bool) -> Self {
        self.flags.inject_date = inject;
        self
    }

    /// Trim context to fit the model instead of failing
    pub fn respect_context_window(mut self, respect: bool) -> Self {
        self.flags.respect_context_window = respect;
        self
    }

    /// Set the strftime format of the injected date
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.flags.date_format = format.into();
        self
    }

    /// Log progress at `info`
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.flags.verbose = verbose;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<AgentSpec> {
        let role = required(self.role, "role")?;
        let goal = required(self.goal, "goal")?;
        let backstory = required(self.backstory, "backstory")?;
        let llm = self
            .llm
            .ok_or_else(|| CrewError::InvalidAgent(format!("agent '{role}' has no LLM")))?;

        if StrftimeItems::new(&self.flags.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(CrewError::InvalidAgent(format!(
                "invalid date format '{}'",
                self.flags.date_format
            )));
        }

        Ok(AgentSpec {
            role,
            goal,
            backstory,
            llm,
            flags: self.flags,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CrewError::InvalidAgent(format!("{field} must not be empty"))),
    }
}
