//! Two-agent ETF research pipeline
//!
//! An equity research analyst looks for stocks matching a fixed investment
//! thesis, then a portfolio constructor turns that research into a 20-stock
//! ETF bucket. Every kickoff, task, and LLM call is traced to Braintrust.

use agent_crew::{AgentSpec, Crew, CrewOutput, Orchestrator, Process, TaskSpec};
use agent_llm::providers::{OpenAIConfig, OpenAIProvider};
use agent_llm::{Llm, LlmConfig};
use agent_telemetry::{
    DEFAULT_EXPERIMENT_NAME, DEFAULT_PROJECT_NAME, TelemetryContext, TracerProvider,
    TracingOptions, setup_tracing,
};
use agent_utils::require_vars;
use clap::Parser;
use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Investment thesis the crew researches
pub const THESIS: &str = "small-cap Chinese equities";

/// Model both agents use
pub const MODEL: &str = "gpt-4o-mini";

/// Credentials the pipeline cannot run without
pub const REQUIRED_ENV_VARS: [&str; 2] = ["BRAINTRUST_API_KEY", "OPENAI_API_KEY"];

const DATE_FORMAT: &str = "%B %d, %Y";
const BANNER_WIDTH: usize = 50;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(35);

/// Command-line options
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "etf-crew")]
#[command(about = "Research an investment thesis and build an ETF bucket", long_about = None)]
pub struct Cli {
    /// Braintrust project receiving the traces
    #[arg(long, default_value = DEFAULT_PROJECT_NAME)]
    pub project_name: String,

    /// Experiment name recorded with the run
    #[arg(long, default_value = DEFAULT_EXPERIMENT_NAME)]
    pub experiment_name: String,

    /// Chat model for both agents
    #[arg(long, default_value = MODEL)]
    pub model: String,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
            model: MODEL.to_string(),
        }
    }
}

/// Stock researcher
pub fn researcher(llm: Arc<Llm>) -> agent_crew::Result<AgentSpec> {
    AgentSpec::builder()
        .role("Equity Research Analyst")
        .goal("Identify stocks that align with an investment theme")
        .backstory(concat!(
            "You are a skilled equity analyst that picks stocks that conform to a specific investment theme.",
            "You consider the success of the stock based on fundamental and technical analysis, and how well the stock fits ",
            "the desired investment theme.",
        ))
        .llm(llm)
        .inject_date(true)
        .respect_context_window(true)
        .date_format(DATE_FORMAT)
        .verbose(true)
        .build()
}

/// Portfolio builder
pub fn writer(llm: Arc<Llm>) -> agent_crew::Result<AgentSpec> {
    AgentSpec::builder()
        .role("Portfolio Constructor")
        .goal("Construct a portfolio for an ETF ")
        .backstory(concat!(
            "You are a skilled advisor that constructs portfolios based on a given theme and equity research.",
            "You are also an expert writer that can write a concise summary of the fund's investment thesis ",
            "and describe its objective and composition to a prospective investor.",
        ))
        .llm(llm)
        .inject_date(true)
        .date_format(DATE_FORMAT)
        .verbose(true)
        .build()
}

/// Research the thesis
pub fn research_task(researcher: Arc<AgentSpec>) -> agent_crew::Result<TaskSpec> {
    TaskSpec::builder("research")
        .description(format!("Research stocks that fit the investment thesis: {THESIS}"))
        .expected_output(concat!(
            "A detailed report on stocks that match the given thesis. ",
            "You will return a short description of the equity, why it was included, ",
            "and relevant news/developments.",
        ))
        .agent(researcher)
        .build()
}

/// Build the ETF bucket once research is done
pub fn writing_task(writer: Arc<AgentSpec>, research: &TaskSpec) -> agent_crew::Result<TaskSpec> {
    TaskSpec::builder("writing")
        .description(concat!(
            "Create a list of 20 stocks for an ETF bucket based on the research results. ",
            "Attempt to pick the most successful stocks. You will try to diversify the list.",
        ))
        .expected_output("A list of 20 stocks ")
        .agent(writer)
        .context(&[research])
        .build()
}

/// Both agents and both tasks, run sequentially
pub fn build_crew(llm: Arc<Llm>) -> agent_crew::Result<Crew> {
    let researcher = Arc::new(researcher(llm.clone())?);
    let writer = Arc::new(writer(llm)?);
    let research = research_task(researcher.clone())?;
    let writing = writing_task(writer.clone(), &research)?;

    Crew::builder()
        .agents(vec![researcher, writer])
        .tasks(vec![research, writing])
        .process(Process::Sequential)
        .verbose(true)
        .build()
}

/// Print the result under a `FINAL RESULT` banner
pub fn print_result<W: Write>(out: &mut W, result: &impl Display) -> std::io::Result<()> {
    let rule = "=".repeat(BANNER_WIDTH);
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "FINAL RESULT")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "{result}")?;
    out.flush()
}

/// Kick off the crew and print its result
pub async fn run_pipeline<W: Write>(
    orchestrator: &dyn Orchestrator,
    out: &mut W,
) -> anyhow::Result<CrewOutput> {
    let result = orchestrator.kickoff().await?;
    print_result(out, &result)?;
    Ok(result)
}

/// Verify credentials, set up tracing, and run the pipeline
///
/// Credentials are checked before anything else, so a missing key fails
/// without touching the network or the telemetry context.
pub async fn run<W, F>(
    cli: &Cli,
    lookup: F,
    telemetry: &TelemetryContext,
    out: &mut W,
) -> anyhow::Result<()>
where
    W: Write,
    F: Fn(&str) -> Option<String>,
{
    let env = require_vars(&REQUIRED_ENV_VARS, &lookup)?;

    let mut options = TracingOptions::new(env.get("BRAINTRUST_API_KEY").unwrap_or_default())
        .with_project_name(cli.project_name.clone())
        .with_experiment_name(cli.experiment_name.clone());
    if let Some(url) = lookup("BRAINTRUST_API_URL").filter(|url| !url.is_empty()) {
        options = options.with_api_url(url);
    }
    let provider = setup_tracing(telemetry, options)?;

    let openai = OpenAIProvider::with_config(OpenAIConfig::from_lookup(&lookup)?)?;
    let llm = Arc::new(Llm::new(Arc::new(openai), LlmConfig::new(cli.model.clone())));
    let crew = build_crew(llm)?;

    info!("Researching thesis: {}", THESIS);
    let result = run_pipeline(&crew, out).await;
    shutdown_tracing(provider).await;
    result.map(|_| ())
}

/// Flush pending spans; the exporter blocks, so it runs off the runtime
async fn shutdown_tracing(provider: Arc<TracerProvider>) {
    let shutdown = tokio::task::spawn_blocking(move || provider.shutdown());
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, shutdown).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("Trace export did not finish cleanly: {}", e),
        Ok(Err(e)) => warn!("Trace export shutdown panicked: {}", e),
        Err(_) => warn!("Trace export shutdown timed out after {:?}", SHUTDOWN_TIMEOUT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_crew::TaskContext;
    use agent_llm::{
        CompletionRequest, CompletionResponse, LLMProvider, Message, StopReason, TokenUsage,
    };
    use agent_telemetry::{CrewInstrumentor, Instrumentor, LlmInstrumentor};
    use async_trait::async_trait;
    use mockall::mock;
    use opentelemetry_sdk::trace::{BatchSpanProcessor, InMemorySpanExporter, SpanData};
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Default)]
    struct StubProvider {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> agent_llm::Result<CompletionResponse> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.messages[0].content.clone());
            let reply = if prompts.len() == 1 {
                "RESEARCH: ACME Holdings"
            } else {
                "1. ACME Holdings"
            };
            Ok(CompletionResponse {
                message: Message::assistant(reply),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    mock! {
        Crew {}

        #[async_trait]
        impl Orchestrator for Crew {
            async fn kickoff(&self) -> agent_crew::Result<CrewOutput>;
        }
    }

    fn stub_llm(provider: Arc<StubProvider>) -> Arc<Llm> {
        Arc::new(Llm::new(provider, LlmConfig::new(MODEL)))
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_agents_match_pipeline_roles() {
        let llm = stub_llm(Arc::default());
        let researcher = researcher(llm.clone()).unwrap();
        let writer = writer(llm).unwrap();

        assert_eq!(researcher.role(), "Equity Research Analyst");
        assert!(researcher.flags().inject_date);
        assert!(researcher.flags().respect_context_window);
        assert!(researcher.flags().verbose);
        assert_eq!(researcher.flags().date_format, "%B %d, %Y");
        assert_eq!(researcher.llm().model(), "gpt-4o-mini");

        assert_eq!(writer.role(), "Portfolio Constructor");
        assert!(writer.flags().inject_date);
        assert!(writer.backstory().contains("equity research.You are also"));
    }

    #[test]
    fn test_writing_task_reads_only_research() {
        let crew = build_crew(stub_llm(Arc::default())).unwrap();
        let [research, writing] = crew.tasks() else {
            panic!("expected two tasks");
        };

        assert!(research.description().ends_with(THESIS));
        assert_eq!(
            writing.context(),
            &TaskContext::Explicit(vec![research.id().clone()])
        );
        assert_eq!(crew.graph().upstream(writing.id()), [research.id().clone()]);
        assert!(crew.graph().upstream(research.id()).is_empty());
        assert_eq!(crew.agents().len(), 2);
        assert_eq!(crew.process(), Process::Sequential);
    }

    #[test]
    fn test_print_result_banner() {
        let mut out = Vec::new();
        print_result(&mut out, &"X").unwrap();

        let rule = "=".repeat(50);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("\n{rule}\nFINAL RESULT\n{rule}\nX\n")
        );
    }

    #[tokio::test]
    async fn test_run_pipeline_prints_orchestrator_result() {
        let mut crew = MockCrew::new();
        crew.expect_kickoff().times(1).returning(|| {
            Ok(CrewOutput {
                raw: "X".to_string(),
                tasks_output: Vec::new(),
                token_usage: TokenUsage::default(),
            })
        });

        let mut out = Vec::new();
        let result = run_pipeline(&crew, &mut out).await.unwrap();

        assert_eq!(result.raw, "X");
        let printed = String::from_utf8(out).unwrap();
        let rule = "=".repeat(50);
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines, vec!["", rule.as_str(), "FINAL RESULT", rule.as_str(), "X"]);
    }

    #[tokio::test]
    async fn test_crew_run_prints_writer_output_only() {
        let provider = Arc::new(StubProvider::default());
        let crew = build_crew(stub_llm(provider.clone())).unwrap();
        let mut out = Vec::new();

        let result = run_pipeline(&crew, &mut out).await.unwrap();
        assert_eq!(result.raw, "1. ACME Holdings");
        assert_eq!(result.tasks_output.len(), 2);

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.ends_with("FINAL RESULT\n==================================================\n1. ACME Holdings\n"));
        assert!(!printed.contains("RESEARCH:"));

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].starts_with("Research stocks that fit the investment thesis: small-cap Chinese equities"));
        assert!(prompts[1].contains("This is the context you're working with:\nRESEARCH: ACME Holdings"));
        assert!(prompts[1].contains("Current Date: "));
    }

    fn spans_named<'a>(spans: &'a [SpanData], name: &str) -> Vec<&'a SpanData> {
        spans.iter().filter(|s| s.name == name).collect()
    }

    #[tokio::test]
    async fn test_kickoff_spans_are_linked() {
        let telemetry = TelemetryContext::with_service_name("etf-crew");
        let provider = telemetry.get_or_install();
        let exporter = InMemorySpanExporter::default();
        provider.add_span_processor("memory", BatchSpanProcessor::builder(exporter.clone()).build());
        CrewInstrumentor.instrument(&provider);
        LlmInstrumentor.instrument(&provider);

        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(provider.layer()));
        let crew = build_crew(stub_llm(Arc::default())).unwrap();
        crew.kickoff().await.unwrap();
        provider.force_flush().unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        let kickoffs = spans_named(&spans, "crew.kickoff");
        let tasks = spans_named(&spans, "crew.task");
        let agents = spans_named(&spans, "agent.execute_task");
        assert_eq!(kickoffs.len(), 1);
        assert_eq!(tasks.len(), 2);
        assert_eq!(agents.len(), 2);
        assert_eq!(spans.len(), 5);

        let kickoff = kickoffs[0];
        for task in &tasks {
            assert_eq!(task.parent_span_id, kickoff.span_context.span_id());
            assert_eq!(task.span_context.trace_id(), kickoff.span_context.trace_id());
        }
        for agent in &agents {
            assert!(
                tasks
                    .iter()
                    .any(|task| agent.parent_span_id == task.span_context.span_id())
            );
            assert!(
                agent
                    .attributes
                    .iter()
                    .any(|kv| kv.key.as_str() == "crew.run_id")
            );
        }
    }

    #[tokio::test]
    async fn test_run_without_credentials_names_both() {
        let telemetry = TelemetryContext::new();
        let mut out = Vec::new();

        let err = run(&Cli::default(), no_env, &telemetry, &mut out)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("BRAINTRUST_API_KEY"));
        assert!(message.contains("OPENAI_API_KEY"));

        assert!(telemetry.provider().is_none());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_run_with_one_missing_key_names_only_that_key() {
        let telemetry = TelemetryContext::new();
        let lookup = |name: &str| (name == "OPENAI_API_KEY").then(|| "sk-test".to_string());

        let err = run(&Cli::default(), lookup, &telemetry, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: BRAINTRUST_API_KEY"
        );
        assert!(telemetry.provider().is_none());
    }

    #[test]
    fn test_cli_defaults_reproduce_fixed_invocation() {
        let cli = Cli::try_parse_from(["etf-crew"]).unwrap();
        assert_eq!(cli, Cli::default());
        assert_eq!(cli.project_name, "SlavinScratchArea");

        let cli = Cli::try_parse_from(["etf-crew", "--project-name", "Equities", "--model", "gpt-4o"])
            .unwrap();
        assert_eq!(cli.project_name, "Equities");
        assert_eq!(cli.model, "gpt-4o");
    }
}
