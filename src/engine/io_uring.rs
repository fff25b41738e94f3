//! io_uring IO engine
//!
//! Asynchronous IO through Linux's io_uring interface. Operations are pushed to
//! the submission queue by `submit()` and handed to the kernel in one batch by
//! the next `poll_completions()`, which then blocks for at least one completion.
//!
//! # Requirements
//!
//! - Linux kernel 5.1 or later
//! - io_uring feature must be enabled in Cargo.toml

use super::{EngineCapabilities, EngineConfig, IOCompletion, IOEngine, IOOperation, OperationType};
use crate::Result;
use anyhow::Context;
use io_uring::{opcode, types, IoUring};
use std::collections::HashMap;

/// Upper bound on ring entries; larger windows spill by flushing the SQ early
const MAX_RING_ENTRIES: usize = 4096;

/// io_uring IO engine
pub struct IoUringEngine {
    /// The io_uring instance
    ring: Option<IoUring>,

    /// Configuration
    config: Option<EngineConfig>,

    /// Operation type of every submitted, not yet completed operation
    pending_ops: HashMap<u64, OperationType>,
}

impl IoUringEngine {
    /// Create a new io_uring engine
    pub fn new() -> Self {
        Self {
            ring: None,
            config: None,
            pending_ops: HashMap::new(),
        }
    }

    fn ring_mut(&mut self) -> Result<&mut IoUring> {
        self.ring
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("io_uring engine not initialized"))
    }

    /// Translate a CQE result code into bytes transferred or an error
    fn completion_result(op_type: OperationType, result_code: i32) -> Result<usize> {
        if result_code >= 0 {
            Ok(result_code as usize)
        } else {
            let errno = -result_code;
            Err(std::io::Error::from_raw_os_error(errno))
                .context(format!("{} operation failed: errno={}", op_type, errno))
        }
    }
}

impl Default for IoUringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IOEngine for IoUringEngine {
    fn init(&mut self, config: &EngineConfig) -> Result<()> {
        let entries = config.queue_depth.clamp(1, MAX_RING_ENTRIES) as u32;
        let ring = IoUring::new(entries).context("Failed to create io_uring instance")?;

        self.ring = Some(ring);
        self.config = Some(config.clone());
        self.pending_ops.clear();

        Ok(())
    }

    fn submit(&mut self, op: IOOperation) -> Result<()> {
        let length: u32 = op
            .length
            .try_into()
            .map_err(|_| anyhow::anyhow!("operation length {} exceeds u32", op.length))?;

        let entry = match op.op_type {
            OperationType::Read => opcode::Read::new(types::Fd(op.target_fd), op.buffer, length)
                .offset(op.offset)
                .build()
                .user_data(op.user_data),
            OperationType::Write => {
                opcode::Write::new(types::Fd(op.target_fd), op.buffer as *const u8, length)
                    .offset(op.offset)
                    .build()
                    .user_data(op.user_data)
            }
        };

        let ring = self.ring_mut()?;

        // SAFETY: the caller guarantees the buffer outlives the operation
        // (see IOEngine::submit); the entry itself is copied into the ring.
        let pushed = unsafe { ring.submission().push(&entry).is_ok() };
        if !pushed {
            // Submission queue full: hand the queued entries to the kernel and retry
            ring.submit().context("Failed to flush io_uring submission queue")?;
            unsafe {
                ring.submission()
                    .push(&entry)
                    .map_err(|_| anyhow::anyhow!("Submission queue full"))?;
            }
        }

        self.pending_ops.insert(op.user_data, op.op_type);
        Ok(())
    }

    fn poll_completions(&mut self) -> Result<Vec<IOCompletion>> {
        if self.pending_ops.is_empty() {
            return Ok(Vec::new());
        }

        let ring = self
            .ring
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("io_uring engine not initialized"))?;

        // Submit any queued operations and wait for at least one completion
        loop {
            match ring.submit_and_wait(1) {
                Ok(_) => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(e).context("Failed to submit and wait for completions");
                }
            }
        }

        let mut completions = Vec::new();
        for cqe in ring.completion() {
            let user_data = cqe.user_data();
            let op_type = self
                .pending_ops
                .remove(&user_data)
                .ok_or_else(|| anyhow::anyhow!("Completion for unknown operation {}", user_data))?;

            completions.push(IOCompletion {
                user_data,
                result: Self::completion_result(op_type, cqe.result()),
            });
        }

        Ok(completions)
    }

    fn cleanup(&mut self) -> Result<()> {
        // Buffers must not be released while the kernel still owns them
        if let Some(ref mut ring) = self.ring {
            while !self.pending_ops.is_empty() {
                ring.submit_and_wait(1)
                    .context("Failed to wait for outstanding operations during cleanup")?;
                for cqe in ring.completion() {
                    self.pending_ops.remove(&cqe.user_data());
                }
            }
        }

        self.ring = None;
        self.pending_ops.clear();

        Ok(())
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            async_io: true,
            max_queue_depth: self
                .config
                .as_ref()
                .map(|c| c.queue_depth)
                .unwrap_or(MAX_RING_ENTRIES),
        }
    }
}
