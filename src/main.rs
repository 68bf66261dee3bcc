// -----------------------------------------------------------------------------
// docstore-bench - fixed-budget load generator for document-store backends
// -----------------------------------------------------------------------------

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docstore_bench::config::BenchmarkConfig;
use docstore_bench::driver::RunDriver;
use docstore_bench::operations::WorkloadKind;
use docstore_bench::simulated_store::SimulatedStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as RtBuilder;
use tracing::info;

// -----------------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------------
#[derive(Parser)]
#[command(name = "docstore-bench", version, about = "Fixed-budget, high-concurrency document-store benchmark")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workload against the simulated backend
    ///
    /// Examples:
    ///   docstore-bench -v run --config bench.yaml
    ///   docstore-bench run --workload ReadStream --item-count 10000 --concurrency 16
    Run {
        /// YAML config file; built-in defaults are used when omitted
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Override workload_type
        #[arg(long)]
        workload: Option<String>,

        /// Override item_count (total operations)
        #[arg(long)]
        item_count: Option<u64>,

        /// Override the derived worker count
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override warmup_fraction
        #[arg(long)]
        warmup_fraction: Option<f64>,

        /// Write the JSON run summary into this directory
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// Do not draw the progress bar
        #[arg(long)]
        no_progress: bool,

        /// Print the run summary as JSON instead of the text block
        #[arg(long)]
        json: bool,
    },
    /// List registered workload names
    ListWorkloads,
    /// Print the default configuration as YAML
    DefaultConfig,
}

// -----------------------------------------------------------------------------
// main
// -----------------------------------------------------------------------------
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",  // Default: only warnings and errors
        1 => "info",  // -v: run progress
        2 => "debug", // -vv: per-worker detail
        _ => "trace",
    };

    // RUST_LOG wins when set
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docstore_bench={}", level)));
    fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            config,
            workload,
            item_count,
            concurrency,
            warmup_fraction,
            results_dir,
            no_progress,
            json,
        } => {
            let mut cfg = match &config {
                Some(path) => BenchmarkConfig::from_yaml_file(path)?,
                None => BenchmarkConfig::default(),
            };
            if let Some(w) = workload {
                cfg.workload_type = w;
            }
            if let Some(n) = item_count {
                cfg.item_count = n;
            }
            if concurrency.is_some() {
                cfg.concurrency = concurrency;
            }
            if let Some(f) = warmup_fraction {
                cfg.warmup_fraction = f;
            }
            if results_dir.is_some() {
                cfg.results_dir = results_dir;
            }
            run_cmd(cfg, !no_progress, json)?
        }
        Commands::ListWorkloads => {
            for kind in WorkloadKind::ALL {
                println!("{}", kind);
            }
        }
        Commands::DefaultConfig => {
            let yaml = serde_yaml::to_string(&BenchmarkConfig::default())
                .context("serialize default config")?;
            print!("{}", yaml);
        }
    }

    Ok(())
}

fn run_cmd(cfg: BenchmarkConfig, show_progress: bool, json: bool) -> Result<()> {
    cfg.validate()?;
    info!(
        "Running {} ({} items) against {}/{}",
        cfg.workload_type, cfg.item_count, cfg.database, cfg.container
    );

    let rt = RtBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let store = Arc::new(SimulatedStore::new(cfg.backend.clone()));
    let driver = RunDriver::new(cfg, store).with_progress_bar(show_progress);
    let summary = rt.block_on(driver.execute())?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize run summary")?
        );
    } else {
        summary.print();
    }
    Ok(())
}
