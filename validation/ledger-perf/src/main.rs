//! Load generator CLI for ledger node APIs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ledger_perf::{PerfResult, PerfRunner, ResultsReport, RunConfig, TestCaseRegistry};

#[derive(Parser)]
#[command(name = "ledger-perf")]
#[command(about = "Load generator for ledger node HTTP APIs", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test from a config file
    Run {
        /// Path to run config YAML file
        #[arg(short, long)]
        config: PathBuf,

        /// Override the worker count of every configured test
        #[arg(short, long)]
        workers: Option<u32>,

        /// Override the number of loops per worker
        #[arg(short, long)]
        loops: Option<u64>,

        /// Build requests without sending them
        #[arg(long)]
        dry_run: bool,

        /// Output format: table (default), json, csv
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Validate a config file and prepare its test cases without sending anything
    Validate {
        /// Path to run config YAML file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List registered test cases
    List,
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Exit code for a run rejected before any worker started.
const EXIT_STARTUP: i32 = 2;

/// Pass through a result, exiting early on configuration errors.
fn startup<T>(result: PerfResult<T>) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_startup() => {
            error!(error = %e, "Run rejected before start");
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_STARTUP);
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            config,
            workers,
            loops,
            dry_run,
            output,
        } => {
            info!(path = %config.display(), "Loading run config");
            let mut run_config = startup(RunConfig::from_file(&config))?;

            // Apply overrides
            if let Some(w) = workers {
                for test in &mut run_config.tests {
                    test.workers = w;
                }
            }
            if let Some(l) = loops {
                run_config.loops = Some(l);
            }
            if dry_run {
                run_config.dry_run = true;
            }

            let runner = startup(PerfRunner::new(run_config))?;

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping workers after their current action");
                    ctrl_c.cancel();
                }
            });

            let report = runner.run(cancel).await?;
            let results = &report.results;

            match output.as_str() {
                "json" => {
                    println!("{}", ResultsReport::format_json(results)?);
                }
                "csv" => {
                    println!("{}", ResultsReport::csv_header());
                    println!("{}", ResultsReport::format_csv(results));
                }
                _ => {
                    println!("{}", ResultsReport::format_table(results));
                }
            }

            if results.failed > 0 {
                warn!(failed = results.failed, "Run finished with failed actions");
            }

            Ok(())
        }
        Commands::Validate { config } => {
            let run_config = startup(RunConfig::from_file(&config))?;
            let runner = startup(PerfRunner::new(run_config))?;
            let cfg = runner.config();

            println!("✓ Configuration is valid");
            println!("  Name: {}", cfg.name);
            println!("  Nodes: {}", cfg.node_urls.len());
            println!("  Workers: {}", cfg.total_workers());
            println!("  Actions per loop: {}", cfg.actions_per_loop);
            for test in &cfg.tests {
                println!("  - {} ({} workers)", test.name, test.workers);
            }

            Ok(())
        }
        Commands::List => {
            println!("Registered test cases:");
            for name in TestCaseRegistry::new().names() {
                println!("  {}", name);
            }
            Ok(())
        }
    }
}
