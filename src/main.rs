//! SeqRing stress driver
//!
//! Runs writer and reader workers against one ring buffer and prints how long
//! the run took next to a rough expectation.

use anyhow::Context;
use clap::Parser;
use seqring::harness::{run_stress, StressConfig};
use seqring::ring::{RingBufferBuilder, RingConfig, WaitGranularity};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "seqring")]
#[command(about = "Stress a reserve/commit ring buffer with concurrent writers and readers")]
#[command(version)]
pub struct Args {
    /// JSON configuration file with `ring` and `stress` sections
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ring buffer capacity
    #[arg(short = 's', long)]
    pub capacity: Option<usize>,

    /// Writers and readers to spawn (each)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Writers to spawn, overrides --workers
    #[arg(long)]
    pub writers: Option<usize>,

    /// Readers to spawn, overrides --workers
    #[arg(long)]
    pub readers: Option<usize>,

    /// Workers stop once they hold this sequence (default capacity * 100)
    #[arg(short, long)]
    pub max_sequence: Option<u64>,

    /// Multiplier for the synthetic work between reserve and commit
    #[arg(long)]
    pub work_factor: Option<u32>,

    /// Wait channel topology (coarse, fine-grained)
    #[arg(short, long)]
    pub granularity: Option<WaitGranularity>,

    /// Execution units provisioned for the run (detected by default)
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Trace every suspension and resolution
    #[arg(short, long)]
    pub diagnostics: bool,

    /// Pin worker threads to CPU cores
    #[arg(long)]
    pub pin_cores: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Layout of the configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    ring: RingConfig,
    stress: StressConfig,
}

impl FileConfig {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Command line values win over the file
    fn apply(mut self, args: &Args) -> Self {
        // Without a file the ring defaults to ten slots
        if args.config.is_none() {
            self.ring.capacity = 10;
        }
        if let Some(capacity) = args.capacity {
            self.ring.capacity = capacity;
        }
        if let Some(granularity) = args.granularity {
            self.ring.granularity = granularity;
        }
        if let Some(parallelism) = args.parallelism {
            self.ring.parallelism = Some(parallelism);
        }
        self.ring.diagnostics |= args.diagnostics;

        if let Some(workers) = args.workers {
            self.stress.writers = workers;
            self.stress.readers = workers;
        }
        if let Some(writers) = args.writers {
            self.stress.writers = writers;
        }
        if let Some(readers) = args.readers {
            self.stress.readers = readers;
        }
        if args.max_sequence.is_some() {
            self.stress.max_sequence = args.max_sequence;
        }
        if let Some(work_factor) = args.work_factor {
            self.stress.work_factor = work_factor;
        }
        self.stress.pin_cores |= args.pin_cores;
        self
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    // Diagnostics events are emitted at debug level
    let level = if args.diagnostics && args.log_level == "info" {
        "debug"
    } else {
        args.log_level.as_str()
    };
    init_logging(level)?;

    let config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    }
    .apply(&args);

    info!("Configuration: {config:?}");

    let ring = RingBufferBuilder::from_config(config.ring)
        .build()
        .context("failed to create ring buffer")?;

    let report = run_stress(Arc::new(ring), &config.stress)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    if !report.consistent {
        anyhow::bail!("cursor totals do not match worker operations");
    }
    Ok(())
}

/// Initialize logging based on the specified level
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}
