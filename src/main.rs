//! testfarm-logger CLI - replay recorded test runs into TestFarm result files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use testfarm_logger::checksum::checksum;
use testfarm_logger::config::TESTS_RUN_CONFIG_PARAM;
use testfarm_logger::host::replay::{ReplayHost, ReplayStats};
use testfarm_logger::identity::canonical_name;
use testfarm_logger::orchestrator::{InitOptions, RunOrchestrator};
use testfarm_logger::report::{RunStatus, RunSummary};

#[derive(Parser)]
#[command(name = "testfarm-logger")]
#[command(about = "Mirror test-run results to local files and a TestFarm service", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines event stream through the logger
    Replay {
        /// Event file, or `-` for stdin
        events: String,

        /// Run configuration (JSON) enabling remote reporting
        #[arg(long)]
        run_config: Option<PathBuf>,

        /// Result directory (defaults to $TESTFARM_WORKING_DIR)
        #[arg(short, long)]
        working_dir: Option<PathBuf>,

        /// Maximum result events processed concurrently
        #[arg(short, long, default_value_t = 1)]
        parallel: usize,
    },

    /// Print the canonical name of each raw test name
    Name {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the checksum of a string
    Checksum { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {}", e))?;

    match cli.command {
        Commands::Replay {
            events,
            run_config,
            working_dir,
            parallel,
        } => {
            let summary = replay(&events, run_config, working_dir, parallel).await?;
            if !summary.passed() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Name { names } => {
            for name in names {
                println!("{}", canonical_name(&name));
            }
            Ok(())
        }
        Commands::Checksum { text } => {
            println!("{}", checksum(&text));
            Ok(())
        }
    }
}

async fn replay(
    events: &str,
    run_config: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    parallel: usize,
) -> Result<RunSummary> {
    let mut options = InitOptions::from_env();
    if let Some(dir) = working_dir {
        options = options.with_working_dir(dir);
    }
    if let Some(path) = run_config {
        options = options.with_parameter(
            TESTS_RUN_CONFIG_PARAM,
            Some(path.to_string_lossy().into_owned()),
        );
    }

    let mut host = ReplayHost::new().with_parallelism(parallel);
    let orchestrator = RunOrchestrator::initialize(&mut host, options)
        .context("Failed to initialize test run logger")?;

    let reader = open_events(events).await?;
    let stats = host
        .run(reader)
        .await
        .with_context(|| format!("Failed to read events from {}", events))?;

    if stats.run_completes == 0 {
        warn!("Event stream ended without run completion, treating the run as aborted");
        orchestrator.complete_run(true, false);
    }

    let summary_path = orchestrator.writer().summary_path();
    let summary = load_summary(&summary_path)?;
    info!("Replayed {} events", stats.discovered + stats.results);
    print_summary(&stats, &orchestrator, &summary);
    Ok(summary)
}

async fn open_events(events: &str) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if events == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(events)
        .await
        .with_context(|| format!("Failed to open event file {}", events))?;
    Ok(Box::new(BufReader::new(file)))
}

fn load_summary(path: &Path) -> Result<RunSummary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read run summary {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse run summary {}", path.display()))
}

fn print_summary(stats: &ReplayStats, orchestrator: &RunOrchestrator, summary: &RunSummary) {
    println!();
    println!("{}", console::style("Run Summary").bold());
    println!("  Discovered: {}", stats.discovered);
    println!("  Results:    {}", stats.results);
    println!("  Registered: {}", orchestrator.tracker().count());
    if stats.malformed > 0 {
        println!("  Malformed:  {}", console::style(stats.malformed).yellow());
    }
    if summary.is_aborted {
        println!("  {}", console::style("Run was aborted").red());
    }
    if summary.is_canceled {
        println!("  {}", console::style("Run was canceled").yellow());
    }
    println!("  Results in: {}", orchestrator.working_dir().display());
    println!();

    match summary.overall_status {
        RunStatus::Passed => println!("{}", console::style("Run passed.").green().bold()),
        RunStatus::Failed => println!("{}", console::style("Run failed.").red().bold()),
    }
}
