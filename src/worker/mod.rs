//! Phase execution
//!
//! A phase is one direction (write or read) at one operation size. The
//! [`PhaseRunner`] splits the phase's iterations across a scoped pool of worker
//! threads. Each [`Worker`] owns an IO engine and runs a sliding window over
//! it: fill the window, wait for the oldest task, record it, refill.
//!
//! # Tasks and chunks
//!
//! One iteration is one task of `size` bytes at offset `iteration * size`. A
//! task reaches the engine as `ceil(size / block_size)` chunk operations and is
//! complete once every chunk has completed. The queue depth bounds chunk
//! operations in flight, summed over all workers. Each worker keeps only as
//! many tasks open as it needs to fill its share of the queue depth, so a task
//! larger than that share is issued a few chunks at a time.
//!
//! # Failures
//!
//! A chunk that errors or transfers fewer bytes than requested fails its task.
//! Failed tasks produce no sample and advance a consecutive-failure counter
//! shared by the workers of the phase; any success resets it. Once the counter
//! exceeds the configured threshold every worker stops submitting, drains what
//! it has in flight and the phase reports [`BenchError::IoFailure`]. Workers
//! never return while the engine still owns one of their buffers.
//!
//! # Example
//!
//! ```no_run
//! use aiosweep::engine::{create_engine, Direction};
//! use aiosweep::config::EngineType;
//! use aiosweep::worker::{NoProgress, PhasePlan, PhaseRunner};
//!
//! let factory = || create_engine(EngineType::Sync);
//! let runner = PhaseRunner::new(&factory, &NoProgress);
//!
//! let plan = PhasePlan {
//!     direction: Direction::Write,
//!     size_bytes: 2 * 1024 * 1024,
//!     iterations: 200,
//!     threads: 16,
//!     queue_depth: 64,
//!     block_size: 2 * 1024 * 1024,
//!     fd: 3,
//!     failure_threshold: 32,
//! };
//! let result = runner.run(&plan)?;
//! println!("mean latency {:.6}s", result.latency.mean);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::engine::{Direction, EngineConfig, IOEngine, IOOperation};
use crate::error::BenchError;
use crate::stats::collector::{RunResult, SampleCollector};
use crate::stats::AlignedCounter;
use crate::util::buffer::{BufferPool, DEFAULT_ALIGNMENT};
use crate::util::fast_time::FastInstant;
use crate::Result;
use anyhow::Context;
use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Builds one engine per worker
pub type EngineFactory<'f> = dyn Fn() -> Result<Box<dyn IOEngine>> + Sync + 'f;

/// Receives a callback for every finished (completed or failed) task
pub trait ProgressObserver: Sync {
    fn on_progress(&self, direction: Direction, done: u64, total: u64);
}

/// Observer that ignores progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _direction: Direction, _done: u64, _total: u64) {}
}

/// Observer that logs every tenth of a phase through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, direction: Direction, done: u64, total: u64) {
        let step = (total / 10).max(1);
        if done % step == 0 || done == total {
            tracing::info!(%direction, done, total, "phase progress");
        }
    }
}

/// Parameters of one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    pub direction: Direction,
    pub size_bytes: u64,
    pub iterations: usize,
    pub threads: usize,
    pub queue_depth: usize,
    pub block_size: u64,
    /// Target file shared by all workers
    pub fd: RawFd,
    pub failure_threshold: usize,
}

/// The part of a phase one worker runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSlice {
    /// Global index of the worker's first iteration
    pub first_iteration: usize,
    pub iterations: usize,
    /// Chunk operations this worker may keep in flight
    pub window: usize,
}

/// Even split of `total` over `parts`, remainder to the lowest indices
#[inline]
fn share(total: usize, parts: usize, index: usize) -> usize {
    total / parts + usize::from(index < total % parts)
}

impl PhasePlan {
    fn validate(&self) -> std::result::Result<(), BenchError> {
        let zero = [
            ("size", self.size_bytes == 0),
            ("iterations", self.iterations == 0),
            ("threads", self.threads == 0),
            ("queue depth", self.queue_depth == 0),
            ("block size", self.block_size == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(BenchError::Config(format!("{} must be greater than 0", name)));
        }
        if usize::try_from(self.size_bytes).is_err() {
            return Err(BenchError::Config(format!(
                "size {} does not fit in memory",
                self.size_bytes
            )));
        }
        Ok(())
    }

    /// Workers spawned for the phase
    ///
    /// Never more than there are iterations to run or window slots to hand out.
    pub fn worker_count(&self) -> usize {
        self.threads.min(self.iterations).min(self.queue_depth)
    }

    /// Chunk operations per task
    pub fn chunks_per_task(&self) -> usize {
        self.size_bytes.div_ceil(self.block_size) as usize
    }

    /// Iterations and window share of worker `index`
    pub fn worker_slice(&self, index: usize) -> WorkerSlice {
        let workers = self.worker_count();
        let iterations = share(self.iterations, workers, index);
        let base = self.iterations / workers;
        let first_iteration = index * base + index.min(self.iterations % workers);

        WorkerSlice {
            first_iteration,
            iterations,
            window: share(self.queue_depth, workers, index).min(iterations * self.chunks_per_task()),
        }
    }
}

/// State shared by all workers of a phase
struct PhaseState {
    collector: SampleCollector,
    consecutive_failures: AtomicUsize,
    aborted: AtomicBool,
    abort_reason: OnceLock<String>,
    finished: AlignedCounter,
}

impl PhaseState {
    fn new(plan: &PhasePlan) -> Self {
        Self {
            collector: SampleCollector::new(plan.direction, plan.size_bytes),
            consecutive_failures: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
            abort_reason: OnceLock::new(),
            finished: AlignedCounter::new(),
        }
    }

    /// Stop the phase; the first reason given is the one reported
    fn abort(&self, reason: String) {
        let _ = self.abort_reason.set(reason);
        self.aborted.store(true, Ordering::Release);
    }

    #[inline]
    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    fn into_result(self, plan: &PhasePlan) -> std::result::Result<RunResult, BenchError> {
        if self.is_aborted() {
            return Err(BenchError::IoFailure {
                direction: plan.direction,
                size_bytes: plan.size_bytes,
                completed: self.collector.len() as u64,
                failed: self.collector.failed_count(),
                reason: self
                    .abort_reason
                    .into_inner()
                    .unwrap_or_else(|| "phase aborted".to_string()),
            });
        }
        self.collector.seal()
    }
}

/// Runs phases over a pool of scoped worker threads
pub struct PhaseRunner<'a> {
    engine_factory: &'a EngineFactory<'a>,
    observer: &'a dyn ProgressObserver,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(engine_factory: &'a EngineFactory<'a>, observer: &'a dyn ProgressObserver) -> Self {
        Self {
            engine_factory,
            observer,
        }
    }

    /// Run every iteration of the phase and seal its samples
    ///
    /// # Errors
    ///
    /// - [`BenchError::Config`] for a plan with a zero parameter
    /// - [`BenchError::IoFailure`] if the phase was aborted
    /// - [`BenchError::InvalidInput`] if no iteration succeeded
    pub fn run(&self, plan: &PhasePlan) -> std::result::Result<RunResult, BenchError> {
        plan.validate()?;

        let state = PhaseState::new(plan);
        let workers = plan.worker_count();
        tracing::debug!(
            direction = %plan.direction,
            size = plan.size_bytes,
            workers,
            chunks_per_task = plan.chunks_per_task(),
            "starting phase"
        );

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let slice = plan.worker_slice(id);
                    let state = &state;
                    scope.spawn(move || {
                        let engine = match (self.engine_factory)() {
                            Ok(engine) => engine,
                            Err(e) => {
                                state.abort(format!("worker {}: failed to create engine: {:#}", id, e));
                                return;
                            }
                        };

                        let mut worker = Worker::new(id, plan, slice, engine, state, self.observer);
                        if let Err(e) = worker.run() {
                            tracing::warn!(worker = id, error = %format!("{:#}", e), "worker failed");
                            state.abort(format!("worker {}: {:#}", id, e));
                        }
                    })
                })
                .collect();

            for handle in handles {
                if handle.join().is_err() {
                    state.abort("worker thread panicked".to_string());
                }
            }
        });

        state.into_result(plan)
    }
}

/// A task submitted to the engine and not yet retired
#[derive(Debug)]
struct InFlightTask {
    offset: u64,
    length: usize,
    chunks_total: usize,
    chunks_submitted: usize,
    chunks_done: usize,
    started: Option<FastInstant>,
    finished: Option<FastInstant>,
    failure: Option<String>,
}

/// Floor for a latency sample; coarse clocks can read the same tick twice
const MIN_LATENCY_SECS: f64 = 1e-9;

/// How a retired task ended
enum TaskOutcome {
    Completed(f64),
    Failed(String),
    /// Never fully submitted because the phase aborted
    Abandoned,
}

impl InFlightTask {
    fn new(offset: u64, length: usize, chunks_total: usize) -> Self {
        Self {
            offset,
            length,
            chunks_total,
            chunks_submitted: 0,
            chunks_done: 0,
            started: None,
            finished: None,
            failure: None,
        }
    }

    fn chunk_len(&self, chunk: usize, block_size: usize) -> usize {
        block_size.min(self.length - chunk * block_size)
    }

    /// Nothing of this task is owned by the engine any more
    fn is_settled(&self, aborted: bool) -> bool {
        self.chunks_done == self.chunks_submitted
            && (self.chunks_submitted == self.chunks_total || aborted)
    }

    fn complete_chunk(&mut self, chunk: usize, block_size: usize, result: Result<usize>) {
        self.chunks_done += 1;

        let expected = self.chunk_len(chunk, block_size);
        let failure = match result {
            Ok(n) if n == expected => None,
            Ok(n) => Some(format!(
                "short transfer at offset {}: {} of {} bytes",
                self.offset + (chunk * block_size) as u64,
                n,
                expected
            )),
            Err(e) => Some(format!("{:#}", e)),
        };
        if self.failure.is_none() {
            self.failure = failure;
        }

        if self.chunks_done == self.chunks_total {
            self.finished = Some(FastInstant::now());
        }
    }

    fn outcome(self) -> TaskOutcome {
        if self.chunks_done < self.chunks_total {
            return TaskOutcome::Abandoned;
        }
        if let Some(reason) = self.failure {
            return TaskOutcome::Failed(reason);
        }
        match (self.started, self.finished) {
            (Some(start), Some(end)) => {
                TaskOutcome::Completed(end.secs_since(start).max(MIN_LATENCY_SECS))
            }
            _ => TaskOutcome::Abandoned,
        }
    }
}

/// Chunk identity carried through the engine: buffer slot and chunk index
#[inline]
fn encode_user_data(slot: usize, chunk: usize) -> u64 {
    ((slot as u64) << 32) | chunk as u64
}

#[inline]
fn decode_user_data(user_data: u64) -> (usize, usize) {
    ((user_data >> 32) as usize, (user_data & 0xFFFF_FFFF) as usize)
}

/// One worker thread's share of a phase
pub struct Worker<'a> {
    id: usize,
    plan: &'a PhasePlan,
    slice: WorkerSlice,
    engine: Box<dyn IOEngine>,
    state: &'a PhaseState,
    observer: &'a dyn ProgressObserver,
}

impl<'a> Worker<'a> {
    fn new(
        id: usize,
        plan: &'a PhasePlan,
        slice: WorkerSlice,
        engine: Box<dyn IOEngine>,
        state: &'a PhaseState,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            id,
            plan,
            slice,
            engine,
            state,
            observer,
        }
    }

    /// Run this worker's iterations
    ///
    /// The engine is cleaned up before the buffers are released, whatever
    /// happened during dispatch.
    fn run(&mut self) -> Result<()> {
        self.engine
            .init(&EngineConfig {
                queue_depth: self.slice.window,
            })
            .context("Failed to initialize IO engine")?;

        let caps = self.engine.capabilities();
        let op_capacity = self.slice.window.min(caps.max_queue_depth).max(1);
        // Enough open tasks to keep every operation slot busy
        let window = op_capacity
            .div_ceil(self.plan.chunks_per_task())
            .min(self.slice.iterations)
            .max(1);
        tracing::debug!(
            worker = self.id,
            async_io = caps.async_io,
            op_capacity,
            tasks = window,
            "worker starting"
        );

        let mut buffers = match BufferPool::new(window, self.plan.size_bytes as usize, DEFAULT_ALIGNMENT) {
            Ok(buffers) => buffers,
            Err(e) => {
                let _ = self.engine.cleanup();
                return Err(e).context("Failed to allocate IO buffers");
            }
        };
        if self.plan.direction == Direction::Write {
            buffers.prefill_random();
        }

        let outcome = self.dispatch(&mut buffers, window, op_capacity);

        if let Err(e) = self.engine.cleanup() {
            // The kernel may still reference the buffers; leaking them is the only safe option
            std::mem::forget(buffers);
            return Err(e).context("Failed to drain IO engine");
        }
        drop(buffers);

        outcome
    }

    /// The sliding-window loop
    ///
    /// `window` is how many tasks may be open at once and `op_capacity` how
    /// many chunk operations may be outstanding. Synchronous engines accept
    /// one operation, so a multi-chunk task is then issued one chunk at a time.
    fn dispatch(&mut self, buffers: &mut BufferPool, window: usize, op_capacity: usize) -> Result<()> {
        let size = self.plan.size_bytes as usize;
        let block_size = (self.plan.block_size as usize).min(size);
        let chunks_per_task = self.plan.chunks_per_task();
        let op_type = self.plan.direction.op_type();

        let mut tasks: Vec<Option<InFlightTask>> = (0..window).map(|_| None).collect();
        let mut order: VecDeque<usize> = VecDeque::with_capacity(window);
        let mut ops_in_flight = 0usize;
        let mut next = 0usize;

        loop {
            let aborted = self.state.is_aborted();

            // Fill the window
            while !aborted && next < self.slice.iterations && order.len() < window {
                let Some(slot) = buffers.get() else { break };
                let iteration = (self.slice.first_iteration + next) as u64;
                tasks[slot] = Some(InFlightTask::new(
                    iteration * self.plan.size_bytes,
                    size,
                    chunks_per_task,
                ));
                order.push_back(slot);
                next += 1;
            }

            // Issue chunks in submission order while the engine has room
            if !aborted {
                for &slot in &order {
                    if ops_in_flight >= op_capacity {
                        break;
                    }
                    let task = tasks[slot]
                        .as_mut()
                        .ok_or_else(|| anyhow::anyhow!("window slot {} is empty", slot))?;
                    let base = buffers.get_buffer_mut(slot).as_mut_ptr();

                    while task.chunks_submitted < task.chunks_total && ops_in_flight < op_capacity {
                        let chunk = task.chunks_submitted;
                        let op = IOOperation {
                            op_type,
                            target_fd: self.plan.fd,
                            offset: task.offset + (chunk * block_size) as u64,
                            // SAFETY: chunk * block_size < length == buffer size
                            buffer: unsafe { base.add(chunk * block_size) },
                            length: task.chunk_len(chunk, block_size),
                            user_data: encode_user_data(slot, chunk),
                        };

                        if task.started.is_none() {
                            task.started = Some(FastInstant::now());
                        }
                        self.engine.submit(op)?;
                        task.chunks_submitted += 1;
                        ops_in_flight += 1;
                    }
                }
            }

            let Some(&oldest) = order.front() else { break };
            let settled = tasks[oldest]
                .as_ref()
                .map(|task| task.is_settled(aborted))
                .unwrap_or(true);

            if settled {
                order.pop_front();
                buffers.return_buffer(oldest);
                if let Some(task) = tasks[oldest].take() {
                    self.retire(task)?;
                }
                continue;
            }

            if ops_in_flight == 0 {
                anyhow::bail!("worker {} stalled with no operations in flight", self.id);
            }

            // Block for the oldest; anything else that completes is stashed in its task
            for completion in self.engine.poll_completions()? {
                ops_in_flight = ops_in_flight.saturating_sub(1);
                let (slot, chunk) = decode_user_data(completion.user_data);
                let task = tasks
                    .get_mut(slot)
                    .and_then(Option::as_mut)
                    .ok_or_else(|| anyhow::anyhow!("completion for unknown slot {}", slot))?;
                task.complete_chunk(chunk, block_size, completion.result);
            }
        }

        Ok(())
    }

    /// Record a retired task and report progress
    fn retire(&self, task: InFlightTask) -> Result<()> {
        match task.outcome() {
            TaskOutcome::Abandoned => return Ok(()),
            TaskOutcome::Completed(elapsed) => {
                self.state.consecutive_failures.store(0, Ordering::Relaxed);
                self.state.collector.record(elapsed)?;
            }
            TaskOutcome::Failed(reason) => {
                self.state.collector.record_failure();
                let consecutive = self.state.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(worker = self.id, consecutive, %reason, "task failed");
                if consecutive > self.plan.failure_threshold {
                    self.state.abort(format!(
                        "{} consecutive failures exceeded threshold {}; last error: {}",
                        consecutive, self.plan.failure_threshold, reason
                    ));
                }
            }
        }

        let done = self.state.finished.add(1);
        self.observer
            .on_progress(self.plan.direction, done, self.plan.iterations as u64);
        Ok(())
    }
}
