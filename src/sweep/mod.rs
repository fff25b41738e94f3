//! Size sweep
//!
//! For every configured size the controller creates the size's data file,
//! runs the write phase, syncs, runs the read phase over the same offsets and
//! removes the file. A failure inside one size is reported on that size's
//! [`SizeReport`]; only configuration errors stop the sweep.

use crate::config::validator::validate_config;
use crate::config::BenchmarkConfig;
use crate::engine::Direction;
use crate::error::BenchError;
use crate::stats::collector::RunResult;
use crate::target::{prepare_directory, SizeTarget};
use crate::worker::{EngineFactory, PhasePlan, PhaseRunner, ProgressObserver};

/// Outcome of one size
#[derive(Debug)]
pub struct SizeReport {
    pub size_bytes: u64,
    pub write: Result<RunResult, BenchError>,
    pub read: Result<RunResult, BenchError>,
    /// Set when the size's data file could not be removed
    pub cleanup: Option<BenchError>,
    /// Whether a data file was created for this size
    pub target_created: bool,
}

impl SizeReport {
    /// Both phases produced statistics
    pub fn succeeded(&self) -> bool {
        self.write.is_ok() && self.read.is_ok()
    }

    pub fn phase(&self, direction: Direction) -> &Result<RunResult, BenchError> {
        match direction {
            Direction::Write => &self.write,
            Direction::Read => &self.read,
        }
    }
}

/// Drives the sweep over all configured sizes
pub struct SweepController<'a> {
    config: &'a BenchmarkConfig,
    runner: PhaseRunner<'a>,
}

impl<'a> SweepController<'a> {
    pub fn new(
        config: &'a BenchmarkConfig,
        engine_factory: &'a EngineFactory<'a>,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            config,
            runner: PhaseRunner::new(engine_factory, observer),
        }
    }

    /// Run every size and collect the reports
    pub fn run(&self) -> Result<Vec<SizeReport>, BenchError> {
        let mut reports = Vec::with_capacity(self.config.sizes.len());
        self.run_each(|report| reports.push(report))?;
        Ok(reports)
    }

    /// Run every size, handing each report to `on_report` as soon as it is done
    ///
    /// # Errors
    ///
    /// Fails before any IO if the configuration is invalid or the target
    /// directory cannot be prepared.
    pub fn run_each(&self, mut on_report: impl FnMut(SizeReport)) -> Result<(), BenchError> {
        validate_config(self.config)?;

        let removed = prepare_directory(&self.config.target_path).map_err(BenchError::Target)?;
        if removed > 0 {
            tracing::info!(
                removed,
                path = %self.config.target_path.display(),
                "removed files left by a previous run"
            );
        }

        for &size in &self.config.sizes {
            let report = self.run_size(size);
            if let Err(BenchError::Config(msg)) = &report.write {
                return Err(BenchError::Config(msg.clone()));
            }
            on_report(report);
        }

        Ok(())
    }

    /// Write, sync, read and clean up one size
    pub fn run_size(&self, size_bytes: u64) -> SizeReport {
        tracing::info!(size = size_bytes, "benchmarking size");

        let target = match SizeTarget::create(
            &self.config.target_path,
            size_bytes,
            self.config.iterations,
            self.config.direct,
        ) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(size = size_bytes, error = %e, "skipping size");
                let reason = format!("target setup failed: {}", e);
                return SizeReport {
                    size_bytes,
                    write: Err(e),
                    read: Err(BenchError::PhaseSkipped {
                        direction: Direction::Read,
                        reason,
                    }),
                    cleanup: None,
                    target_created: false,
                };
            }
        };

        let write = self.runner.run(&self.plan(Direction::Write, size_bytes, target.fd()));

        let read = match &write {
            Err(e) => {
                tracing::warn!(size = size_bytes, error = %e, "write phase failed, skipping read phase");
                Err(BenchError::PhaseSkipped {
                    direction: Direction::Read,
                    reason: format!("write phase failed: {}", e),
                })
            }
            Ok(_) => match target.sync() {
                Ok(()) => self.runner.run(&self.plan(Direction::Read, size_bytes, target.fd())),
                Err(e) => Err(e),
            },
        };

        let cleanup = match target.remove() {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(size = size_bytes, error = %e, "cleanup failed");
                Some(e)
            }
        };

        SizeReport {
            size_bytes,
            write,
            read,
            cleanup,
            target_created: true,
        }
    }

    fn plan(&self, direction: Direction, size_bytes: u64, fd: std::os::unix::io::RawFd) -> PhasePlan {
        PhasePlan {
            direction,
            size_bytes,
            iterations: self.config.iterations,
            threads: self.config.threads,
            queue_depth: self.config.queue_depth,
            block_size: self.config.block_size,
            fd,
            failure_threshold: self.config.failure_threshold,
        }
    }
}
