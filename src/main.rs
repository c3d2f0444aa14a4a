use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use talkless_core::PipelineConfig;
use talkless_pipeline::{schedule, Orchestrator};

#[derive(Parser)]
#[command(
    name = "talkless",
    version,
    about = "Scheduled news-processing engine",
    long_about = "Talk-Less ingests articles from configured outlets, groups them into \
                  per-topic stories, synthesizes cited multi-source summaries, and runs \
                  a rule-based bias scan.\n\n\
                  One invocation is one run (--once) or a recurring schedule \
                  (--scheduled). Results are emitted as structured artifacts for the \
                  read-only serving layer."
)]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(long)]
    config: PathBuf,

    /// Run the pipeline once and exit
    #[arg(long, conflicts_with = "scheduled")]
    once: bool,

    /// Run the pipeline on the configured interval until interrupted
    #[arg(long)]
    scheduled: bool,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    // LOG_LEVEL is the documented knob; RUST_LOG still wins when set.
    let default_level = if verbose {
        "debug".to_string()
    } else {
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = PipelineConfig::from_file(&cli.config)?;
    let interval_secs = config.schedule_interval_secs;
    let orchestrator = Orchestrator::from_config(config)?;

    if cli.scheduled {
        tracing::info!(interval_secs, "running in scheduled mode");
        tokio::select! {
            result = schedule::run_scheduled(&orchestrator, interval_secs) => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
            }
        }
        return Ok(());
    }

    // Default is a single run; --once makes it explicit.
    if !cli.once {
        tracing::debug!("no mode flag given, defaulting to a single run");
    }
    let artifacts = orchestrator.run().await?;
    let report = &artifacts.report;
    tracing::info!(
        run = %report.run_id,
        partial = report.partial,
        articles = report.counts.articles_fetched,
        groups = report.counts.groups_formed,
        summaries = report.counts.summaries_generated,
        failed = report.counts.summaries_failed,
        "run finished"
    );

    // Partial summary failures surface in the report, not the exit code.
    Ok(())
}
