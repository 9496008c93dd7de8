//! Main entry point for the prompt-orchestrator binary
//!
//! Wires the cookie-directory credentials, JSON backlog, output directory
//! and Bing client into a `PoolOrchestrator` and runs it once.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::signal;

use orchestrator::{
    config::{DEFAULT_EVICTION_THRESHOLD, DEFAULT_MAX_ATTEMPTS},
    services::{compose_prompts, BingConfig, BingImageClient, CookieDirSource, ImageDirectory, JsonBacklog, DEFAULT_BING_URL},
    OrchestratorError, PoolOrchestrator, RunConfig,
};
use shared::{logging, worker_debug, worker_info, worker_warn, WorkerId};

/// Drain a prompt backlog through a pool of image-generation accounts
#[derive(Parser)]
#[command(name = "prompt-orchestrator")]
#[command(about = "Generates images for a backlog of prompts using a pool of rate-limited accounts")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Process the backlog once and write back what is left
    Run(RunArgs),
    /// Overwrite the backlog with a generated prompt grid
    Seed(SeedArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Directory holding bing_cookies_<n>.json files
    #[arg(long, default_value = "cookies", env = "COOKIES_DIR")]
    pub cookies_dir: PathBuf,

    /// JSON array of pending prompts
    #[arg(long, default_value = "prompts.json", env = "PROMPTS_FILE")]
    pub prompts: PathBuf,

    /// Where generated images are written
    #[arg(long, default_value = "images", env = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Attempts per prompt before it is left for the next run
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Consecutive failures before an account is dropped for the run
    #[arg(long, default_value_t = DEFAULT_EVICTION_THRESHOLD)]
    pub eviction_threshold: u32,

    #[arg(long, default_value = DEFAULT_BING_URL, env = "BING_URL")]
    pub bing_url: String,

    /// Seconds between result polls
    #[arg(long, default_value = "5")]
    pub poll_interval_secs: u64,

    /// Seconds to wait for one generation before giving up on the attempt
    #[arg(long, default_value = "600")]
    pub generation_timeout_secs: u64,
}

#[derive(Args)]
pub struct SeedArgs {
    /// Subject of every prompt
    #[arg(long, default_value = "apple")]
    pub item: String,

    /// Copies of each angle/lighting combination
    #[arg(long, default_value = "1")]
    pub repeats: usize,

    #[arg(long, default_value = "prompts.json", env = "PROMPTS_FILE")]
    pub prompts: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    logging::init_tracing(&cli.log_level).context("Failed to initialise logging")?;

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Seed(args) => seed(args).await,
    }
}

async fn seed(args: SeedArgs) -> anyhow::Result<()> {
    let me = WorkerId::Orchestrator;
    let prompts = compose_prompts(&args.item, args.repeats);
    let backlog = JsonBacklog::new(&args.prompts);

    backlog
        .seed(&prompts)
        .await
        .with_context(|| format!("Failed to seed {}", args.prompts.display()))?;

    worker_info!(me, "🌱 Wrote {} prompt(s) to {}", prompts.len(), args.prompts.display());
    Ok(())
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => logging::log_shutdown(WorkerId::Orchestrator, "Received Ctrl+C signal"),
        Err(err) => {
            logging::log_error(WorkerId::Orchestrator, "Signal handling", &err);
            std::future::pending::<()>().await;
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let me = WorkerId::Orchestrator;
    logging::log_startup(me, "prompt orchestrator");
    worker_debug!(
        me,
        "Cookies: {}, Prompts: {}, Output: {}",
        args.cookies_dir.display(),
        args.prompts.display(),
        args.output_dir.display()
    );

    let config = RunConfig {
        max_attempts: args.max_attempts,
        eviction_threshold: args.eviction_threshold,
    };

    let output = ImageDirectory::new(&args.output_dir);
    output
        .ensure_exists()
        .await
        .with_context(|| format!("Failed to prepare output directory {}", args.output_dir.display()))?;

    let generator = BingImageClient::new(BingConfig {
        base_url: args.bing_url.trim_end_matches('/').to_string(),
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        timeout: Duration::from_secs(args.generation_timeout_secs),
    })
    .context("Failed to build the Bing client")?;

    let orchestrator = PoolOrchestrator::new(
        CookieDirSource::new(&args.cookies_dir),
        JsonBacklog::new(&args.prompts),
        generator,
        output,
    )
    .with_config(config);

    let summary = match orchestrator.run_until(ctrl_c()).await {
        Ok(summary) => summary,
        Err(e @ OrchestratorError::Interrupted) => {
            logging::log_shutdown(me, "interrupted, finished prompts were removed from the backlog");
            return Err(e.into());
        }
        Err(e @ OrchestratorError::PoolExhausted { .. }) => {
            logging::log_shutdown(me, "every account was evicted");
            return Err(e).context("Run aborted, unfinished prompts were written back");
        }
        Err(e) => return Err(e).context("Run failed"),
    };

    for id in &summary.evicted {
        worker_warn!(me, "🚫 Account {} was evicted during the run", id);
    }
    for item in &summary.abandoned {
        worker_warn!(me, "⏭️  Left for next run: {}", item);
    }
    logging::log_success(
        me,
        &format!(
            "{} of {} prompt(s) completed, {} abandoned, {} remaining",
            summary.completed.len(),
            summary.total,
            summary.abandoned.len(),
            summary.remaining.len()
        ),
    );
    logging::log_shutdown(me, "run complete");
    Ok(())
}
