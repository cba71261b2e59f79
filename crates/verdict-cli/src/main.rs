//! Command-line interface for verdict

mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use verdict_consensus::SignalExtractor;
use verdict_core::{AnalysisRequest, EngineKind, ProgressSink, Reliability};
use verdict_registry::DescriptorFilter;
use verdict_runtime::{ConsensusOptions, Orchestrator};
use verdict_utils::Config;

#[derive(Parser, Debug)]
#[command(name = "verdict")]
#[command(about = "Run analysis engines in parallel and combine them into a weighted verdict", long_about = None)]
struct Cli {
    /// Config file (defaults to ./verdict.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered engines
    Engines {
        /// Only engines of this kind (traditional, scanner)
        #[arg(long)]
        kind: Option<EngineKind>,

        /// Only engines at or above this reliability (low, medium, high)
        #[arg(long)]
        min_reliability: Option<Reliability>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Run engines on a symbol, with consensus unless disabled
    Analyze {
        #[command(flatten)]
        run: RunArgs,

        /// Skip the consensus step
        #[arg(long)]
        no_consensus: bool,

        /// Stream engine progress to stderr
        #[arg(long)]
        progress: bool,
    },
    /// Print only the consensus verdict for a symbol
    Consensus {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Ticker symbol
    symbol: String,

    /// Bar timeframe
    #[arg(short, long, default_value = "1d")]
    timeframe: String,

    /// Comma-separated engine names (default: all)
    #[arg(short, long, value_delimiter = ',')]
    engines: Option<Vec<String>>,

    /// Minimum reliability for an engine to vote (low, medium, high)
    #[arg(long)]
    min_reliability: Option<Reliability>,

    /// Batch deadline in milliseconds (0 disables it)
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    /// Command-line values override the config file
    fn options(&self, config: &Config) -> ConsensusOptions {
        let mut options = config.consensus.clone();
        if let Some(engines) = &self.engines {
            options.engine_names = Some(engines.clone());
        }
        if self.min_reliability.is_some() {
            options.min_reliability = self.min_reliability;
        }
        options
    }

    fn request(&self) -> AnalysisRequest {
        AnalysisRequest::now(self.symbol.to_uppercase(), &self.timeframe)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?.unwrap_or_default(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    verdict_utils::init_tracing_with(&config.logging)?;

    info!(app = %config.app_name, environment = %config.environment, "starting");

    match cli.command {
        Commands::Engines {
            kind,
            min_reliability,
            json,
        } => {
            let orchestrator = orchestrator(&config, None)?;
            let filter = DescriptorFilter {
                kind,
                min_reliability,
            };
            let descriptors = orchestrator.list_descriptors(filter);

            if json {
                println!("{}", serde_json::to_string_pretty(&descriptors)?);
            } else {
                println!("{}", output::engines_table(&descriptors));
            }
        }
        Commands::Analyze {
            run,
            no_consensus,
            progress,
        } => {
            let orchestrator = orchestrator(&config, run.deadline_ms)?;
            let options = run.options(&config).enable_consensus(!no_consensus);
            let (sink, printer) = if progress && !run.json {
                let (sink, printer) = progress_printer();
                (Some(sink), Some(printer))
            } else {
                (None, None)
            };

            let batch = orchestrator
                .run_with_progress(run.request(), &options, sink)
                .await
                .context("Analysis failed")?;

            if let Some(printer) = printer {
                // The channel closes once every engine task has released its sink
                let _ = tokio::time::timeout(Duration::from_millis(250), printer).await;
            }

            if run.json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
                return Ok(());
            }

            println!("{}", output::batch_table(&batch, &SignalExtractor::default()));
            println!(
                "{}/{} engines succeeded in {:.1}ms",
                batch.successful_engines, batch.total_engines, batch.execution_time_ms
            );
            if let Some(consensus) = &batch.consensus {
                if !consensus.is_insufficient() {
                    println!("{}", output::contributions_table(consensus));
                }
                println!("{}", consensus.summary());
            }
        }
        Commands::Consensus { run } => {
            let orchestrator = orchestrator(&config, run.deadline_ms)?;
            let consensus = orchestrator
                .consensus_only(run.request(), &run.options(&config))
                .await
                .context("Consensus failed")?;

            if run.json {
                println!("{}", serde_json::to_string_pretty(&consensus)?);
            } else {
                println!("{}: {}", run.symbol.to_uppercase(), consensus.summary());
            }
        }
    }

    Ok(())
}

/// Default engines under the configured harness, with an optional deadline override
fn orchestrator(config: &Config, deadline_ms: Option<u64>) -> Result<Orchestrator> {
    let mut config = config.clone();
    if let Some(ms) = deadline_ms {
        config.harness.deadline_ms = ms;
    }
    let harness = config.harness_config()?;
    debug!(?harness, "harness configured");

    verdict_engines::default_orchestrator(harness).context("Failed to set up engines")
}

fn progress_printer() -> (ProgressSink, JoinHandle<()>) {
    let (sink, mut rx) = ProgressSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            eprintln!("{}", output::progress_line(&event));
        }
    });
    (sink, printer)
}
