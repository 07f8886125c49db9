//! Prompt templates for agents and tasks

use crate::Result;
use minijinja::{Environment, context};

const SYSTEM_TEMPLATE: &str =
    "You are {{ role }}. {{ backstory }}\nYour personal goal is: {{ goal }}";

const TASK_TEMPLATE: &str = "{{ description }}
{%- if expected_output %}

This is the expected criteria for your final answer: {{ expected_output }}
you MUST return the actual complete content as the final answer, not a summary.
{%- endif %}
{%- if context is not none %}

This is the context you're working with:
{{ context }}
{%- endif %}
{%- if current_date %}

Current Date: {{ current_date }}
{%- endif %}";

/// System prompt describing who the agent is
pub fn system_prompt(role: &str, backstory: &str, goal: &str) -> Result<String> {
    let rendered = Environment::new().render_str(
        SYSTEM_TEMPLATE,
        context! { role => role, backstory => backstory, goal => goal },
    )?;
    Ok(rendered)
}

/// User prompt for one unit of work
///
/// `context` is the joined output of upstream tasks. `None` omits the
/// context block, while `Some("")` renders its header with nothing under it.
pub fn task_prompt(
    description: &str,
    expected_output: Option<&str>,
    context: Option<&str>,
    current_date: Option<&str>,
) -> Result<String> {
    let rendered = Environment::new().render_str(
        TASK_TEMPLATE,
        context! {
            description => description,
            expected_output => expected_output,
            context => context,
            current_date => current_date,
        },
    )?;
    Ok(rendered)
}
