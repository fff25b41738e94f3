//! IO engine abstraction
//!
//! An IO engine is the asynchronous IO primitive the benchmark measures. Workers
//! submit operations to it and block on it for completions; they never talk to
//! the kernel directly. Different engines use different kernel interfaces:
//!
//! - **io_uring**: Linux async IO interface (Linux 5.1+, requires the `io_uring` feature)
//! - **Synchronous**: blocking pread/pwrite wrapped in the submit/poll interface
//! - **Mock**: simulated device with configurable latency and failures, for tests
//!
//! # Example
//!
//! ```no_run
//! use aiosweep::engine::{IOEngine, EngineConfig, IOOperation, OperationType};
//! use aiosweep::engine::sync::SyncEngine;
//!
//! let mut engine = SyncEngine::new();
//! let config = EngineConfig { queue_depth: 4 };
//! engine.init(&config).expect("Failed to initialize engine");
//!
//! let mut buffer = vec![0u8; 4096];
//! engine.submit(IOOperation {
//!     op_type: OperationType::Read,
//!     target_fd: 3,
//!     offset: 0,
//!     buffer: buffer.as_mut_ptr(),
//!     length: buffer.len(),
//!     user_data: 0,
//! })?;
//! let completions = engine.poll_completions()?;
//!
//! engine.cleanup()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::config::EngineType;
use crate::Result;
use serde::Serialize;
use std::os::unix::io::RawFd;

/// IO engine trait for all backends
///
/// # Lifecycle
///
/// 1. Create engine instance (via `new()` on concrete type)
/// 2. Call `init()` with configuration
/// 3. Submit operations via `submit()` and wait for them via `poll_completions()`
/// 4. Call `cleanup()` when done
///
/// # Thread Safety
///
/// Engines must be `Send` to allow transfer between threads, but are not required to
/// be `Sync`. Each worker thread owns its own engine instance.
pub trait IOEngine: Send {
    /// Initialize the engine with the given configuration
    ///
    /// Called once before any IO. Async engines size their rings from
    /// `config.queue_depth`.
    fn init(&mut self, config: &EngineConfig) -> Result<()>;

    /// Submit an IO operation to the engine
    ///
    /// For asynchronous engines this queues the operation; it reaches the kernel
    /// no later than the next `poll_completions()`. Synchronous engines perform
    /// the operation before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation could not be queued. A failure of the
    /// IO itself is reported through [`IOCompletion::result`] instead.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - The buffer pointer in `op` is valid for `op.length` bytes
    /// - The buffer remains valid and unaliased until the operation completes
    /// - The file descriptor is valid and open
    fn submit(&mut self, op: IOOperation) -> Result<()>;

    /// Wait for completed IO operations
    ///
    /// Blocks until at least one outstanding operation has completed and returns
    /// every completion available at that point. Returns an empty vector only
    /// when nothing is outstanding.
    fn poll_completions(&mut self) -> Result<Vec<IOCompletion>>;

    /// Release engine resources
    ///
    /// Waits for any operation still owned by the kernel before releasing
    /// resources, so buffers are never left referenced after cleanup.
    fn cleanup(&mut self) -> Result<()>;

    /// Get engine-specific capabilities
    fn capabilities(&self) -> EngineCapabilities;
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of outstanding IO operations for this engine instance
    pub queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { queue_depth: 32 }
    }
}

/// IO operation descriptor
///
/// # Safety
///
/// The buffer pointer must be valid and properly aligned for the duration of the
/// operation. For O_DIRECT operations, buffers must be aligned to the device's
/// logical block size.
#[derive(Debug)]
pub struct IOOperation {
    /// Type of operation
    pub op_type: OperationType,

    /// File descriptor of the target file or device
    pub target_fd: RawFd,

    /// Byte offset within the target
    pub offset: u64,

    /// Source (write) or destination (read) buffer
    pub buffer: *mut u8,

    /// Number of bytes to transfer
    pub length: usize,

    /// Returned unchanged in the matching [`IOCompletion`]
    pub user_data: u64,
}

// Safety: IOOperation contains a raw pointer but is only used within a single thread
// and the pointer lifetime is managed by the caller
unsafe impl Send for IOOperation {}

/// Operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Read `length` bytes at `offset` into the buffer
    Read,

    /// Write `length` bytes from the buffer at `offset`
    Write,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Read => write!(f, "read"),
            OperationType::Write => write!(f, "write"),
        }
    }
}

/// Direction of a benchmark phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    /// Engine operation used to carry out this direction
    pub fn op_type(self) -> OperationType {
        match self {
            Direction::Write => OperationType::Write,
            Direction::Read => OperationType::Read,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Write => write!(f, "write"),
            Direction::Read => write!(f, "read"),
        }
    }
}

/// Completed IO operation
#[derive(Debug)]
pub struct IOCompletion {
    /// User data from the original IOOperation
    pub user_data: u64,

    /// Bytes transferred, or the error that occurred
    ///
    /// A byte count below the requested length is a short transfer; engines
    /// report it as-is and leave the decision to the caller.
    pub result: Result<usize>,
}

/// Engine capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCapabilities {
    /// Engine can have multiple operations in flight simultaneously
    ///
    /// If false, `submit()` performs the IO before returning and workers must
    /// not keep more than `max_queue_depth` operations outstanding, or queued
    /// operations would absorb each other's latency.
    pub async_io: bool,

    /// Maximum number of operations that can be outstanding simultaneously
    pub max_queue_depth: usize,
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self {
            async_io: false,
            max_queue_depth: 1,
        }
    }
}

/// Create a fresh engine of the configured type
///
/// Each worker calls this once so that no engine state is shared across threads.
pub fn create_engine(engine_type: EngineType) -> Result<Box<dyn IOEngine>> {
    match engine_type {
        EngineType::Sync => Ok(Box::new(sync::SyncEngine::new())),
        #[cfg(feature = "io_uring")]
        EngineType::IoUring => Ok(Box::new(io_uring::IoUringEngine::new())),
        #[cfg(not(feature = "io_uring"))]
        EngineType::IoUring => {
            anyhow::bail!("io_uring engine not available (built without the io_uring feature)")
        }
    }
}

pub mod sync;
pub mod mock;

#[cfg(feature = "io_uring")]
pub mod io_uring;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_maps_to_operation() {
        assert_eq!(Direction::Write.op_type(), OperationType::Write);
        assert_eq!(Direction::Read.op_type(), OperationType::Read);
        assert_eq!(Direction::Write.to_string(), "write");
        assert_eq!(Direction::Read.to_string(), "read");
    }

    #[test]
    fn test_create_sync_engine() {
        let engine = create_engine(EngineType::Sync).unwrap();
        let caps = engine.capabilities();
        assert!(!caps.async_io);
        assert_eq!(caps.max_queue_depth, 1);
    }
}
