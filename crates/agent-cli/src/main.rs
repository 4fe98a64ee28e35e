//! Stock agent binary

use agent_nest::{Launcher, NestConfig, RunMode, wait_for_signal};
use agent_stock::{AnalysisService, HttpAnalysisService, StockConfig};
use agent_utils::{EnvLookup, LogFormat, env::ProcessEnv};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Pick the mode from NEST_ENABLED / NEST_DUAL_MODE
    Auto,
    Standalone,
    Agent,
    Dual,
}

impl ModeArg {
    fn requested(self) -> Option<RunMode> {
        match self {
            Self::Auto => None,
            Self::Standalone => Some(RunMode::Standalone),
            Self::Agent => Some(RunMode::AgentOnly),
            Self::Dual => Some(RunMode::Dual),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "stock-agent")]
#[command(about = "NASDAQ stock analysis agent with A2A peer integration", long_about = None)]
struct Args {
    /// Which servers to run
    #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
    mode: ModeArg,

    /// Port of the plain HTTP API (overrides API_PORT)
    #[arg(long)]
    api_port: Option<u16>,

    /// Bind address of both servers (overrides API_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Log output format: text or json (overrides LOG_FORMAT)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_format = ProcessEnv.optional("LOG_FORMAT");
    let format = args
        .log_format
        .or_else(|| env_format.as_deref().and_then(|v| v.parse().ok()))
        .unwrap_or_default();
    agent_utils::init_tracing_with("info", format);
    if args.log_format.is_none() {
        if let Some(raw) = env_format.filter(|v| v.parse::<LogFormat>().is_err()) {
            warn!(value = %raw, "ignoring unknown LOG_FORMAT");
        }
    }

    let mut config = NestConfig::from_env();
    if let Some(port) = args.api_port {
        config.api_port = port;
    }
    if let Some(host) = args.host {
        config.api_host = host;
    }

    let stock_config = StockConfig::from_env()?;
    let analysis: Arc<dyn AnalysisService> = Arc::new(HttpAnalysisService::new(&stock_config)?);
    info!(url = %stock_config.analysis_url, "using analysis service");

    let mode = RunMode::resolve(args.mode.requested(), &config);
    info!(%mode, agent_id = %config.agent_id, "starting stock-agent");

    let launcher = Launcher::new(config, analysis, mode);
    let shutdown = launcher.shutdown_token();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.cancel();
    });

    launcher.run().await?;
    Ok(())
}
