//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Everything ends up in a [`BenchmarkConfig`], which is built once and then
//! passed explicitly to the sweep; nothing here is process-global.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete benchmark configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Directory that receives the per-size benchmark files
    pub target_path: PathBuf,
    /// Operation sizes to sweep, in bytes
    pub sizes: Vec<u64>,
    /// Write (and read) iterations per size
    pub iterations: usize,
    /// Worker threads per phase
    pub threads: usize,
    /// Maximum operations in flight across all workers
    pub queue_depth: usize,
    /// Largest single engine submission; bigger operations are chunked
    pub block_size: u64,
    /// IO engine used by every worker
    #[serde(default)]
    pub engine: EngineType,
    /// Open the target with O_DIRECT
    #[serde(default)]
    pub direct: bool,
    /// Consecutive failed iterations tolerated before a phase is aborted
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,
}

pub(crate) fn default_failure_threshold() -> usize {
    32
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            target_path: PathBuf::from("/mnt/nvme"),
            sizes: vec![2 * 1024 * 1024, 8 * 1024 * 1024, 32 * 1024 * 1024],
            iterations: 200,
            threads: 16,
            queue_depth: 64,
            block_size: 2 * 1024 * 1024,
            engine: EngineType::default(),
            direct: false,
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// IO engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    /// Linux io_uring (requires the `io_uring` feature)
    IoUring,
    /// Blocking pread/pwrite, one operation at a time per worker
    Sync,
}

impl Default for EngineType {
    fn default() -> Self {
        if cfg!(feature = "io_uring") {
            Self::IoUring
        } else {
            Self::Sync
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineType::IoUring => write!(f, "io_uring"),
            EngineType::Sync => write!(f, "sync"),
        }
    }
}
