//! Synchronous IO engine
//!
//! Blocking pread/pwrite wrapped in the submit/poll interface. The operation is
//! carried out inside `submit()` and handed back by the next
//! `poll_completions()`. This is the baseline engine that works everywhere and
//! the fallback when io_uring is unavailable.
//!
//! # Performance
//!
//! Only one operation is ever outstanding per engine (queue depth = 1), so the
//! queue depth of a run is bounded by the worker count instead.
//!
//! # Example
//!
//! ```no_run
//! use aiosweep::engine::{IOEngine, EngineConfig, IOOperation, OperationType};
//! use aiosweep::engine::sync::SyncEngine;
//!
//! let mut engine = SyncEngine::new();
//! engine.init(&EngineConfig::default()).unwrap();
//!
//! let mut buffer = vec![0u8; 4096];
//! let op = IOOperation {
//!     op_type: OperationType::Read,
//!     target_fd: 3,
//!     offset: 0,
//!     buffer: buffer.as_mut_ptr(),
//!     length: buffer.len(),
//!     user_data: 1,
//! };
//! engine.submit(op).unwrap();
//!
//! let completions = engine.poll_completions().unwrap();
//! assert_eq!(completions.len(), 1);
//! ```

use super::{EngineCapabilities, EngineConfig, IOCompletion, IOEngine, IOOperation, OperationType};
use crate::Result;
use anyhow::Context;

/// Synchronous IO engine using pread/pwrite
pub struct SyncEngine {
    /// Result of the one operation performed but not yet polled
    pending_completion: Option<IOCompletion>,
}

impl SyncEngine {
    /// Create a new synchronous IO engine
    pub fn new() -> Self {
        Self {
            pending_completion: None,
        }
    }

    /// Move `length` bytes between `buffer` and `fd` at `offset`
    ///
    /// Loops over partial transfers and EINTR. Stops early when the kernel
    /// moves nothing (EOF on read, a full device on write) and returns the
    /// short count for the caller to judge.
    fn transfer(&self, op: &IOOperation) -> Result<usize> {
        let mut done = 0usize;

        while done < op.length {
            let remaining = op.length - done;
            let position = (op.offset + done as u64) as libc::off_t;

            // SAFETY: the caller guarantees `op.buffer` is valid for `op.length`
            // bytes until the operation completes, which is before we return.
            let moved = unsafe {
                let ptr = op.buffer.add(done) as *mut libc::c_void;
                match op.op_type {
                    OperationType::Write => libc::pwrite(op.target_fd, ptr, remaining, position),
                    OperationType::Read => libc::pread(op.target_fd, ptr, remaining, position),
                }
            };

            match moved {
                0 => break,
                n if n > 0 => done += n as usize,
                _ => {
                    let err = std::io::Error::last_os_error();
                    if err.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(err).context(format!(
                        "{} failed: fd={}, offset={}, length={}",
                        op.op_type, op.target_fd, position, remaining
                    ));
                }
            }
        }

        Ok(done)
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IOEngine for SyncEngine {
    fn init(&mut self, _config: &EngineConfig) -> Result<()> {
        self.pending_completion = None;
        Ok(())
    }

    fn submit(&mut self, op: IOOperation) -> Result<()> {
        if self.pending_completion.is_some() {
            anyhow::bail!("sync engine already has an outstanding operation");
        }

        self.pending_completion = Some(IOCompletion {
            user_data: op.user_data,
            result: self.transfer(&op),
        });

        Ok(())
    }

    fn poll_completions(&mut self) -> Result<Vec<IOCompletion>> {
        Ok(self.pending_completion.take().into_iter().collect())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.pending_completion = None;
        Ok(())
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            async_io: false,
            max_queue_depth: 1,
        }
    }
}
