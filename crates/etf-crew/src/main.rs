//! Command-line entry point for the ETF research crew

use agent_telemetry::TelemetryContext;
use agent_utils::{init_tracing_with, load_dotenv};
use clap::Parser;
use etf_crew::{Cli, run};
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = load_dotenv();
    let cli = Cli::parse();

    let telemetry = TelemetryContext::with_service_name("etf-crew");
    init_tracing_with(telemetry.layer(), "info")?;

    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let mut stdout = std::io::stdout();
    run(&cli, |name| std::env::var(name).ok(), &telemetry, &mut stdout).await
}
