//! CLI Entry Point for ptc-tools
//!
//! Provides command-line interface for:
//! - Running a photon transfer sweep against the simulated camera
//! - Printing the exposure schedule a configuration produces
//! - Dumping the effective configuration as TOML
//!
//! # Usage
//!
//! ```bash
//! ptc_tools run --frames 20 --min-exposure 0.01 --max-exposure 1 --exposures 10
//! ptc_tools run --yes --config config/ptc.toml
//! ptc_tools schedule --exposures 5
//! ptc_tools config
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ptc_tools::config::{PtcConfig, DEFAULT_CONFIG_PATH};
use ptc_tools::hardware::mock::MockCamera;
use ptc_tools::logging;
use ptc_tools::operator::{AutoConfirm, MockLightGate, OperatorGate, StdinPrompt};
use ptc_tools::presentation::{ChannelSink, ConsoleSink, CsvSink, FanOutSink, PresentationSink};
use ptc_tools::ptc::{SweepDriver, SweepOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ptc_tools")]
#[command(about = "Photon transfer curve sampler", long_about = None)]
struct Cli {
    /// Configuration file (default: config/ptc.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a dark pass plus exposure sweep on the simulated camera
    Run {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Confirm both operator gates without asking
        #[arg(long, short)]
        yes: bool,

        /// Output directory for result files
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the exposure schedule
    Schedule {
        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Overrides for the `[sweep]` section
#[derive(Args)]
struct SweepArgs {
    /// Frames per burst
    #[arg(long)]
    frames: Option<usize>,

    /// Shortest exposure, seconds
    #[arg(long)]
    min_exposure: Option<f64>,

    /// Longest exposure, seconds
    #[arg(long)]
    max_exposure: Option<f64>,

    /// Number of exposures
    #[arg(long)]
    exposures: Option<usize>,
}

impl SweepArgs {
    fn apply(&self, config: &mut PtcConfig) {
        if let Some(frames) = self.frames {
            config.sweep.nr_frames = frames;
        }
        if let Some(min) = self.min_exposure {
            config.sweep.minimum_exposure = min;
        }
        if let Some(max) = self.max_exposure {
            config.sweep.maximum_exposure = max;
        }
        if let Some(count) = self.exposures {
            config.sweep.nr_exposures = count;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = PtcConfig::load_from(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    match cli.command {
        Commands::Run { sweep, yes, output } => {
            sweep.apply(&mut config);
            if let Some(dir) = output {
                config.output.directory = dir;
            }
            run_sweep(config, yes).await
        }
        Commands::Schedule { sweep } => {
            sweep.apply(&mut config);
            print_schedule(&config)
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn print_schedule(config: &PtcConfig) -> Result<()> {
    config.validate()?;
    let schedule = config.sweep.schedule()?;
    let precision = config.output.precision;
    for (i, exposure) in schedule.iter().enumerate() {
        println!("{:>4}  {:.*}", i + 1, precision, exposure);
    }
    Ok(())
}

async fn run_sweep(config: PtcConfig, yes: bool) -> Result<()> {
    config.validate()?;
    logging::init_from_config(&config.logging)?;

    let camera = Arc::new(MockCamera::with_config(config.camera.clone()));
    let operator: Arc<dyn OperatorGate> = if yes {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(StdinPrompt)
    };
    let gate = Arc::new(MockLightGate::new(operator, Arc::clone(&camera)));

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_dir = config.output.directory.clone();
    let mut presenter = FanOutSink::new().with(Box::new(ConsoleSink::new(config.output.precision)));
    if config.output.csv {
        let csv_path = output_dir.join(format!("ptc_{stamp}.csv"));
        presenter = presenter.with(Box::new(CsvSink::create(&csv_path)?));
    }

    let (sink, mut events) = ChannelSink::new();
    let consumer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            presenter.handle(event)?;
        }
        Ok::<_, ptc_tools::PtcError>(())
    });

    let driver = SweepDriver::new(camera, gate, Box::new(sink), config.sweep.clone());
    info!(run_id = %driver.run_id(), "sweep created");
    let report = driver.spawn().await??;

    // The driver's sink is dropped with the driver, which ends the consumer.
    consumer.await??;

    // A cancelled sweep leaves no files behind.
    let cancelled = matches!(report.outcome, SweepOutcome::Aborted { .. });
    if config.output.summary_json && !cancelled {
        std::fs::create_dir_all(&output_dir)?;
        let summary_path = output_dir.join(format!("ptc_{stamp}_summary.json"));
        report.write_summary_json(&summary_path)?;
        info!(path = %summary_path.display(), "summary written");
    }

    match report.outcome {
        SweepOutcome::Complete => Ok(()),
        SweepOutcome::Aborted { gate } => {
            warn!(%gate, "sweep cancelled by operator");
            Ok(())
        }
        SweepOutcome::Failed { kind, message } => {
            anyhow::bail!("sweep failed ({kind}): {message}")
        }
    }
}
