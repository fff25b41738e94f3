//! Benchmark error taxonomy
//!
//! Engine and plumbing code reports failures through `anyhow` with context.
//! Everything that crosses a phase or size boundary is converted into a
//! [`BenchError`] so the sweep can decide what is fatal and what is not.

use crate::engine::Direction;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the benchmark core
#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid run parameters; raised before any IO is issued
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A phase was aborted, either because too many consecutive operations
    /// failed or because the engine itself stopped working
    #[error(
        "{direction} phase for {size_bytes} bytes aborted ({completed} completed, {failed} failed): {reason}"
    )]
    IoFailure {
        direction: Direction,
        size_bytes: u64,
        completed: u64,
        failed: u64,
        reason: String,
    },

    /// Statistics were requested for an unusable sample sequence
    #[error("invalid statistics input: {0}")]
    InvalidInput(String),

    /// A benchmark artifact could not be removed
    #[error("failed to clean up {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target path cannot hold the data a size needs
    #[error(
        "insufficient space at {}: {required} bytes required, {available} available",
        path.display()
    )]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// The phase never ran because an earlier phase for the same size failed
    #[error("{direction} phase skipped: {reason}")]
    PhaseSkipped { direction: Direction, reason: String },

    /// Creating, opening or syncing the per-size target failed
    #[error("target setup failed: {0:#}")]
    Target(anyhow::Error),
}

impl BenchError {
    /// Whether this error must abort the whole run rather than a single size
    pub fn is_fatal_for_sweep(&self) -> bool {
        matches!(self, BenchError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_errors_abort_sweep() {
        assert!(BenchError::Config("threads must be > 0".into()).is_fatal_for_sweep());
        assert!(!BenchError::InvalidInput("empty".into()).is_fatal_for_sweep());
        assert!(!BenchError::IoFailure {
            direction: Direction::Write,
            size_bytes: 4096,
            completed: 0,
            failed: 33,
            reason: "device gone".into(),
        }
        .is_fatal_for_sweep());
    }

    #[test]
    fn test_io_failure_message() {
        let err = BenchError::IoFailure {
            direction: Direction::Read,
            size_bytes: 1024,
            completed: 3,
            failed: 5,
            reason: "5 consecutive failures".into(),
        };
        assert_eq!(
            err.to_string(),
            "read phase for 1024 bytes aborted (3 completed, 5 failed): 5 consecutive failures"
        );
    }
}
