//! Mock IO engine for testing
//!
//! This module provides a simulated asynchronous device. Operations complete a
//! fixed latency after they are submitted, without touching any file or buffer,
//! which makes worker and sweep tests fast and deterministic enough to assert on
//! timing.
//!
//! # Features
//!
//! - Configurable per-operation latency
//! - Configurable failure modes (always, every Nth, from the Nth on, short transfers)
//! - Shared instrumentation across sibling engines: operations in flight,
//!   peak in flight, and every submitted operation
//!
//! Workers each own an engine, so tests create one `MockEngine` and hand every
//! worker a [`MockEngine::sibling`]. Siblings share settings and counters but
//! keep their own pending queue.
//!
//! # Example
//!
//! ```
//! use aiosweep::engine::{IOEngine, EngineConfig, IOOperation, OperationType};
//! use aiosweep::engine::mock::MockEngine;
//! use std::time::Duration;
//!
//! let mut engine = MockEngine::new();
//! engine.set_latency(Duration::from_millis(1));
//! engine.init(&EngineConfig::default()).unwrap();
//!
//! let op = IOOperation {
//!     op_type: OperationType::Read,
//!     target_fd: 1,
//!     offset: 0,
//!     buffer: std::ptr::null_mut(),
//!     length: 4096,
//!     user_data: 42,
//! };
//! engine.submit(op).unwrap();
//!
//! let completions = engine.poll_completions().unwrap();
//! assert_eq!(completions.len(), 1);
//! assert_eq!(completions[0].user_data, 42);
//! ```

use super::{EngineCapabilities, EngineConfig, IOCompletion, IOEngine, IOOperation, OperationType};
use crate::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Lock, ignoring poisoning
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How the simulated device misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Every operation succeeds with the requested length
    None,
    /// Every operation fails
    Always,
    /// Every Nth submitted operation fails (N >= 1)
    EveryNth(u64),
    /// Operations succeed until N have been submitted, then all fail
    FromNth(u64),
    /// Operations transfer at most this many bytes
    ShortTransfer(usize),
}

/// Record of a submitted operation for testing verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub op_type: OperationType,
    pub target_fd: i32,
    pub offset: u64,
    pub length: usize,
    pub user_data: u64,
}

/// State shared by sibling engines
#[derive(Debug)]
struct MockDevice {
    latency: Mutex<Duration>,
    failure_mode: Mutex<FailureMode>,
    error_message: Mutex<String>,
    submitted_ops: Mutex<Vec<OperationRecord>>,
    submit_count: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Operation waiting for its simulated completion time
#[derive(Debug)]
struct PendingOp {
    ready_at: Instant,
    user_data: u64,
    length: usize,
    fail: bool,
}

/// Mock IO engine for testing
pub struct MockEngine {
    device: Arc<MockDevice>,
    config: Option<EngineConfig>,
    pending: VecDeque<PendingOp>,
}

impl MockEngine {
    /// Create a new mock engine with zero latency and no failures
    pub fn new() -> Self {
        Self {
            device: Arc::new(MockDevice {
                latency: Mutex::new(Duration::ZERO),
                failure_mode: Mutex::new(FailureMode::None),
                error_message: Mutex::new("Mock IO error".to_string()),
                submitted_ops: Mutex::new(Vec::new()),
                submit_count: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }),
            config: None,
            pending: VecDeque::new(),
        }
    }

    /// Create an engine sharing this engine's device with its own queue
    pub fn sibling(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            config: None,
            pending: VecDeque::new(),
        }
    }

    /// Set the simulated latency applied to subsequently submitted operations
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.device.latency) = latency;
    }

    /// Set how subsequently submitted operations fail
    pub fn set_failure_mode(&self, mode: FailureMode) {
        *lock(&self.device.failure_mode) = mode;
    }

    /// Set the error message returned when operations fail
    pub fn set_error_message(&self, message: String) {
        *lock(&self.device.error_message) = message;
    }

    /// Operations currently outstanding across all siblings
    pub fn in_flight(&self) -> usize {
        self.device.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of operations ever outstanding across all siblings
    pub fn peak_in_flight(&self) -> usize {
        self.device.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Get the number of operations pending on this engine instance
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get a copy of all submitted operations for verification
    pub fn submitted_operations(&self) -> Vec<OperationRecord> {
        lock(&self.device.submitted_ops).clone()
    }

    /// Get the number of submitted operations
    pub fn submitted_count(&self) -> usize {
        lock(&self.device.submitted_ops).len()
    }

    fn should_fail(&self, sequence: u64) -> bool {
        match *lock(&self.device.failure_mode) {
            FailureMode::None | FailureMode::ShortTransfer(_) => false,
            FailureMode::Always => true,
            FailureMode::EveryNth(n) => n > 0 && sequence % n == n - 1,
            FailureMode::FromNth(n) => sequence >= n,
        }
    }

    fn transfer_length(&self, requested: usize) -> usize {
        match *lock(&self.device.failure_mode) {
            FailureMode::ShortTransfer(max) => requested.min(max),
            _ => requested,
        }
    }

    fn complete(&self, op: PendingOp) -> IOCompletion {
        self.device.in_flight.fetch_sub(1, Ordering::SeqCst);

        let result = if op.fail {
            let error_msg = lock(&self.device.error_message).clone();
            Err(anyhow::anyhow!(error_msg))
        } else {
            Ok(self.transfer_length(op.length))
        };

        IOCompletion {
            user_data: op.user_data,
            result,
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IOEngine for MockEngine {
    fn init(&mut self, config: &EngineConfig) -> Result<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn submit(&mut self, op: IOOperation) -> Result<()> {
        if let Some(ref config) = self.config {
            if self.pending.len() >= config.queue_depth {
                anyhow::bail!(
                    "Submission queue full ({} operations outstanding)",
                    self.pending.len()
                );
            }
        }

        lock(&self.device.submitted_ops).push(OperationRecord {
            op_type: op.op_type,
            target_fd: op.target_fd,
            offset: op.offset,
            length: op.length,
            user_data: op.user_data,
        });

        let sequence = self.device.submit_count.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.device.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.device
            .peak_in_flight
            .fetch_max(now_in_flight, Ordering::SeqCst);

        let latency = *lock(&self.device.latency);
        self.pending.push_back(PendingOp {
            ready_at: Instant::now() + latency,
            user_data: op.user_data,
            length: op.length,
            fail: self.should_fail(sequence),
        });

        Ok(())
    }

    fn poll_completions(&mut self) -> Result<Vec<IOCompletion>> {
        let earliest = match self.pending.iter().map(|op| op.ready_at).min() {
            Some(earliest) => earliest,
            None => return Ok(Vec::new()),
        };

        let now = Instant::now();
        if earliest > now {
            std::thread::sleep(earliest - now);
        }

        let now = Instant::now();
        let mut completions = Vec::new();
        let mut still_pending = VecDeque::with_capacity(self.pending.len());
        while let Some(op) = self.pending.pop_front() {
            if op.ready_at <= now {
                completions.push(self.complete(op));
            } else {
                still_pending.push_back(op);
            }
        }
        self.pending = still_pending;

        Ok(completions)
    }

    fn cleanup(&mut self) -> Result<()> {
        while let Some(op) = self.pending.pop_front() {
            let _ = self.complete(op);
        }
        Ok(())
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            async_io: true,
            max_queue_depth: self
                .config
                .as_ref()
                .map(|c| c.queue_depth)
                .unwrap_or(usize::MAX),
        }
    }
}
