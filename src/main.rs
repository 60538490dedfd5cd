//! Markgrab main entry point
//!
//! Command-line interface for the site-to-markdown grabber.

use anyhow::{anyhow, Context};
use clap::Parser;
use markgrab::config::{load_settings, validate};
use markgrab::jobs::{run_discovery, run_worker};
use markgrab::{CrawlConfig, JobQueue, JobState, ProgressBroadcaster};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const STATE_FILE: &str = "last_discovery.json";

/// Markgrab: grab a site as markdown
///
/// Markgrab crawls same-scope pages breadth-first from a seed URL,
/// relocates embedded images, rewrites links to the local copies, and
/// writes one markdown file per page.
#[derive(Parser, Debug)]
#[command(name = "markgrab")]
#[command(version = "1.0.0")]
#[command(about = "Grab a site as markdown", long_about = None)]
struct Cli {
    /// Seed URL the crawl starts from
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML settings file
    #[arg(short, long, value_name = "FILE", default_value = "markgrab.toml")]
    settings: PathBuf,

    /// Count reachable pages without writing anything
    #[arg(long)]
    discover: bool,

    /// Override the output folder
    #[arg(short, long, value_name = "DIR")]
    output: Option<String>,

    /// Override the maximum number of pages grabbed
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Override the maximum number of pages counted in discovery
    #[arg(long, value_name = "N")]
    crawl_limit: Option<usize>,

    /// Override the scope prefix
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Load persisted defaults, then apply command-line overrides
    let settings = load_settings(&cli.settings)
        .with_context(|| format!("failed to load settings from {}", cli.settings.display()))?;

    let mut config = settings.to_config(&cli.url);
    if let Some(output) = cli.output {
        config.markdown_folder = output;
    }
    if let Some(max_pages) = cli.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(crawl_limit) = cli.crawl_limit {
        config.crawl_limit = crawl_limit;
    }
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    config.discover_only = cli.discover;

    validate(&config).context("invalid configuration")?;

    if cli.discover {
        handle_discover(config).await
    } else {
        handle_grab(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("markgrab=info,warn"),
            1 => EnvFilter::new("markgrab=debug,info"),
            2 => EnvFilter::new("markgrab=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs a full grab through the queue and worker, streaming progress lines
/// to stdout until the terminal broadcast.
async fn handle_grab(config: CrawlConfig) -> anyhow::Result<()> {
    let queue = Arc::new(JobQueue::new());
    let state = Arc::new(JobState::new(STATE_FILE));
    let progress = Arc::new(ProgressBroadcaster::new());
    let (_id, mut rx) = progress.subscribe();

    queue.enqueue(config);

    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(run_worker(
        Arc::clone(&queue),
        Arc::clone(&state),
        Arc::clone(&progress),
        shutdown.clone(),
    ));

    let mut failure: Option<String> = None;
    while let Some(line) = rx.recv().await {
        println!("{}", line);
        if line.starts_with("Completed:") {
            break;
        }
        if line.starts_with("Error:") {
            failure = Some(line);
            break;
        }
    }

    shutdown.cancel();
    worker.await?;

    match failure {
        Some(line) => Err(anyhow!(line)),
        None => Ok(()),
    }
}

/// Runs a discovery request, printing the JSON reply. When the run is handed
/// off to the background, keeps streaming progress until it finishes.
async fn handle_discover(config: CrawlConfig) -> anyhow::Result<()> {
    let queue = Arc::new(JobQueue::new());
    let state = Arc::new(JobState::new(STATE_FILE));
    let progress = Arc::new(ProgressBroadcaster::new());

    let response = run_discovery(config, &queue, &state, &progress).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    let handed_off = response.success && response.pages_found.is_none() && !queue.is_empty();
    if handed_off {
        let (_id, mut rx) = progress.subscribe();
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run_worker(
            Arc::clone(&queue),
            Arc::clone(&state),
            Arc::clone(&progress),
            shutdown.clone(),
        ));

        while let Some(line) = rx.recv().await {
            println!("{}", line);
            if line.starts_with("Completed:") || line.starts_with("Error:") {
                break;
            }
        }

        shutdown.cancel();
        worker.await?;
    }

    if response.success {
        Ok(())
    } else {
        Err(anyhow!(response.message))
    }
}
