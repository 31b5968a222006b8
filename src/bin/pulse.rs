//! CLI binary for pulse.
//!
//! The digest goes to stdout; all tracing output goes to stderr.
//!
//! Exit codes: 0 when at least one source answered (or the session was
//! delegated to an external web search), 1 when every reachable backend
//! failed, 2 on usage or configuration errors.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use pulse::{PulseConfig, PulseError};
use pulse_search::config::{Depth, SourceFilter};
use pulse_search::Digest;

/// pulse: what people are saying about a topic right now.
#[derive(Parser, Debug)]
#[command(name = "pulse", version, about)]
struct Cli {
    /// Topic to research.
    #[arg(required = true, num_args = 1..)]
    topic: Vec<String>,

    /// Tool the findings are meant for, carried into the digest.
    #[arg(long)]
    tool: Option<String>,

    /// Lookback window in days.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=30))]
    days: Option<u32>,

    /// Small result ceilings, no supplemental pass.
    #[arg(long, conflicts_with = "deep")]
    quick: bool,

    /// Large result ceilings, expanded supplemental pass.
    #[arg(long)]
    deep: bool,

    /// Which backends to use.
    #[arg(long, value_enum)]
    sources: Option<SourcesArg>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Emit::Json)]
    emit: Emit,

    /// JSON file with results from an external web search.
    #[arg(long)]
    web_results: Option<PathBuf>,

    /// Ask for an external web search even when every backend is reachable.
    #[arg(long)]
    include_web: bool,

    /// Fail instead of delegating to web search when no backend is reachable.
    #[arg(long)]
    no_web_fallback: bool,

    /// Path to TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourcesArg {
    Auto,
    Forum,
    Social,
}

impl From<SourcesArg> for SourceFilter {
    fn from(arg: SourcesArg) -> Self {
        match arg {
            SourcesArg::Auto => Self::Auto,
            SourcesArg::Forum => Self::Forum,
            SourcesArg::Social => Self::Social,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    Json,
    Compact,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "pulse=debug,pulse_search=debug"
    } else {
        "pulse=info,pulse_search=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(cli).await {
        Ok(code) => Ok(code),
        Err(e) if e.is_usage() => {
            tracing::error!(error = %e, "invalid invocation");
            eprintln!("pulse: {e}");
            Ok(ExitCode::from(2))
        }
        Err(e) => {
            tracing::error!(error = %e, "research failed");
            Err(anyhow::anyhow!("pulse failed: {e}"))
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, PulseError> {
    let file = PulseConfig::load(cli.config.as_deref())?;
    let credentials = file.credentials();
    let mut config = file.search_config();

    if cli.quick {
        config.depth = Depth::Quick;
    } else if cli.deep {
        config.depth = Depth::Deep;
    }
    if let Some(days) = cli.days {
        config.lookback_days = days;
    }
    if let Some(sources) = cli.sources {
        config.sources = sources.into();
    }
    if cli.include_web {
        config.include_web = true;
    }
    if cli.no_web_fallback {
        config.allow_web_fallback = false;
    }

    let web_results = match &cli.web_results {
        Some(path) => pulse::load_web_results(path)?,
        None => Vec::new(),
    };

    let topic = cli.topic.join(" ");
    let session = pulse_search::research(&topic, &config, &credentials, web_results).await?;
    let digest = Digest::from_session(&session, cli.tool.as_deref());

    match cli.emit {
        Emit::Json => {
            let json = digest
                .to_json()
                .map_err(|e| PulseError::Config(format!("digest serialization failed: {e}")))?;
            println!("{json}");
        }
        Emit::Compact => print!("{}", pulse::render_compact(&digest)),
    }

    if session.is_total_failure() {
        tracing::warn!("every reachable backend failed");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
