//! aiosweep - asynchronous block-device IO latency sweep
//!
//! aiosweep measures the latency and bandwidth of asynchronous reads and writes
//! against a storage path across a sweep of operation sizes. Every size runs a
//! write phase followed by a read phase, each spread over a pool of worker
//! threads that keep a bounded number of operations in flight.
//!
//! # Architecture
//!
//! - **Engines**: pluggable async IO primitives (io_uring, blocking pread/pwrite, mock)
//! - **Workers**: sliding-window dispatch bounded by the queue depth
//! - **Stats**: lock-free sample collection and descriptive statistics
//! - **Sweep**: per-size target preparation, write/read phases, cleanup
//! - **Output**: text and JSON reporters

pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod stats;
pub mod sweep;
pub mod target;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::BenchmarkConfig;
pub use engine::IOEngine;
pub use error::BenchError;
pub use sweep::{SizeReport, SweepController};

/// Result type used for engine and plumbing code
pub type Result<T> = anyhow::Result<T>;
