//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// IO engine choices exposed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineChoice {
    /// Linux io_uring
    IoUring,
    /// Blocking pread/pwrite
    Sync,
}

/// aiosweep - async IO latency and bandwidth sweep
#[derive(Parser, Debug)]
#[command(name = "aiosweep")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory for benchmark files (previous aiosweep files in it are removed)
    #[arg(long, default_value = "/mnt/nvme")]
    pub nvme_path: PathBuf,

    /// Operation sizes to sweep (e.g., 2M 8M; supports K/M/G)
    #[arg(long, num_args = 1.., default_values = ["2M", "8M", "32M"])]
    pub sizes: Vec<String>,

    /// Iterations per size
    #[arg(long, default_value = "200")]
    pub iterations: usize,

    /// Number of worker threads
    #[arg(long, default_value = "16")]
    pub threads: usize,

    /// Maximum number of operations in flight
    #[arg(long, default_value = "64")]
    pub queue_depth: usize,

    /// Largest single IO submission (supports K/M/G)
    #[arg(long, default_value = "2M")]
    pub block_size: String,

    /// IO engine (defaults to io-uring when built with it, sync otherwise)
    #[arg(long, value_enum)]
    pub engine: Option<EngineChoice>,

    /// Use direct IO (O_DIRECT); sizes and block size must be multiples of 512
    #[arg(long)]
    pub direct: bool,

    /// Consecutive failed operations tolerated before a phase is aborted
    #[arg(long, default_value = "32")]
    pub failure_threshold: usize,

    /// Write results as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// TOML file with benchmark parameters (cannot be combined with the parameter flags above)
    #[arg(
        long,
        conflicts_with_all = [
            "nvme_path",
            "sizes",
            "iterations",
            "threads",
            "queue_depth",
            "block_size",
            "engine",
            "direct",
            "failure_threshold",
        ]
    )]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
