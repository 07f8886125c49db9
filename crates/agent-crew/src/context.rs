//! What the crew hands an agent for one task

/// Per-task inputs that do not belong to the task definition itself
///
/// # Example
///
/// ```
/// use agent_crew::Context;
///
/// let ctx = Context::new()
///     .with_run_id("run-1")
///     .with_upstream_output("previous findings");
///
/// assert_eq!(ctx.run_id(), Some("run-1"));
/// assert_eq!(ctx.upstream_output(), Some("previous findings"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    run_id: Option<String>,
    upstream_output: Option<String>,
    current_date: Option<String>,
}

impl Context {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the kickoff identifier
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set the aggregated upstream output
    pub fn with_upstream_output(mut self, output: impl Into<String>) -> Self {
        self.upstream_output = Some(output.into());
        self
    }

    /// Pin the date string injected into prompts, overriding the clock
    pub fn with_current_date(mut self, date: impl Into<String>) -> Self {
        self.current_date = Some(date.into());
        self
    }

    /// Kickoff identifier shared by every task of one run
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Aggregated raw output of upstream tasks
    pub fn upstream_output(&self) -> Option<&str> {
        self.upstream_output.as_deref()
    }

    /// Pinned date string
    pub fn current_date(&self) -> Option<&str> {
        self.current_date.as_deref()
    }
}
