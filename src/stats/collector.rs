//! Per-phase sample collection
//!
//! Workers push one latency sample per completed task into a shared
//! [`SampleCollector`]. Appends are lock-free; the sequence is only read once,
//! when the phase seals it into a [`RunResult`].

use super::{bandwidth_mb_s, summarize, AlignedCounter, StatisticsSummary};
use crate::engine::Direction;
use crate::error::BenchError;
use crossbeam::queue::SegQueue;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// One successfully completed task
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    latency: f64,
    bandwidth: f64,
}

/// Thread-safe accumulator for one (size, direction) phase
pub struct SampleCollector {
    direction: Direction,
    size_bytes: u64,
    samples: SegQueue<Sample>,
    failed: AlignedCounter,
    sealed: AtomicBool,
}

impl SampleCollector {
    pub fn new(direction: Direction, size_bytes: u64) -> Self {
        Self {
            direction,
            size_bytes,
            samples: SegQueue::new(),
            failed: AlignedCounter::new(),
            sealed: AtomicBool::new(false),
        }
    }

    /// Record a completed task that took `elapsed_secs`
    ///
    /// The matching bandwidth sample is derived from the collector's size.
    pub fn record(&self, elapsed_secs: f64) -> Result<(), BenchError> {
        if self.sealed.load(Ordering::Acquire) {
            return Err(BenchError::InvalidInput(format!(
                "{} collector for {} bytes is already sealed",
                self.direction, self.size_bytes
            )));
        }
        if !elapsed_secs.is_finite() || elapsed_secs <= 0.0 {
            return Err(BenchError::InvalidInput(format!(
                "elapsed time must be positive and finite, got {}",
                elapsed_secs
            )));
        }

        self.samples.push(Sample {
            latency: elapsed_secs,
            bandwidth: bandwidth_mb_s(self.size_bytes, elapsed_secs),
        });
        Ok(())
    }

    /// Count a failed iteration; failures produce no sample
    pub fn record_failure(&self) {
        self.failed.add(1);
    }

    /// Samples recorded so far
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.get()
    }

    /// Close the phase and compute its statistics
    ///
    /// # Errors
    ///
    /// [`BenchError::InvalidInput`] if the collector was sealed before or
    /// holds no samples.
    pub fn seal(&self) -> Result<RunResult, BenchError> {
        if self.sealed.swap(true, Ordering::AcqRel) {
            return Err(BenchError::InvalidInput(format!(
                "{} collector for {} bytes sealed twice",
                self.direction, self.size_bytes
            )));
        }

        let mut latency_samples = Vec::with_capacity(self.samples.len());
        let mut bandwidth_samples = Vec::with_capacity(self.samples.len());
        while let Some(sample) = self.samples.pop() {
            latency_samples.push(sample.latency);
            bandwidth_samples.push(sample.bandwidth);
        }

        if latency_samples.is_empty() {
            return Err(BenchError::InvalidInput(format!(
                "no successful {} operations for {} bytes ({} failed)",
                self.direction,
                self.size_bytes,
                self.failed.get()
            )));
        }

        let latency = summarize(&latency_samples)?;
        let bandwidth = summarize(&bandwidth_samples)?;

        Ok(RunResult {
            direction: self.direction,
            size_bytes: self.size_bytes,
            latency_samples,
            bandwidth_samples,
            failed_iterations: self.failed.get(),
            latency,
            bandwidth,
        })
    }
}

/// Sealed outcome of one phase
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub direction: Direction,
    pub size_bytes: u64,
    /// Seconds per task, in completion order
    pub latency_samples: Vec<f64>,
    /// MB/s per task, parallel to `latency_samples`
    pub bandwidth_samples: Vec<f64>,
    pub failed_iterations: u64,
    pub latency: StatisticsSummary,
    pub bandwidth: StatisticsSummary,
}

impl RunResult {
    pub fn sample_count(&self) -> usize {
        self.latency_samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_and_seal() {
        let collector = SampleCollector::new(Direction::Write, 1_048_576);
        for _ in 0..10 {
            collector.record(0.001).unwrap();
        }
        assert_eq!(collector.len(), 10);

        let result = collector.seal().unwrap();
        assert_eq!(result.direction, Direction::Write);
        assert_eq!(result.sample_count(), 10);
        assert_eq!(result.bandwidth_samples.len(), 10);
        assert_eq!(result.failed_iterations, 0);
        assert!((result.latency.mean - 0.001).abs() < 1e-12);
        assert!((result.bandwidth.mean - 1048.576).abs() < 1e-6);
    }

    #[test]
    fn test_bandwidth_derived_per_sample() {
        let collector = SampleCollector::new(Direction::Read, 2_000_000);
        collector.record(1.0).unwrap();
        collector.record(2.0).unwrap();

        let result = collector.seal().unwrap();
        for (lat, bw) in result.latency_samples.iter().zip(&result.bandwidth_samples) {
            assert!((bw - 2.0 / lat).abs() < 1e-12);
        }
    }

    #[test]
    fn test_completion_order_preserved() {
        let collector = SampleCollector::new(Direction::Read, 4096);
        for v in [0.3, 0.1, 0.2] {
            collector.record(v).unwrap();
        }
        let result = collector.seal().unwrap();
        assert_eq!(result.latency_samples, vec![0.3, 0.1, 0.2]);
    }

    #[test]
    fn test_invalid_elapsed_rejected() {
        let collector = SampleCollector::new(Direction::Write, 4096);
        assert!(collector.record(0.0).is_err());
        assert!(collector.record(-1.0).is_err());
        assert!(collector.record(f64::NAN).is_err());
        assert!(collector.record(f64::INFINITY).is_err());
        assert!(collector.is_empty());
    }

    #[test]
    fn test_record_after_seal_rejected() {
        let collector = SampleCollector::new(Direction::Write, 4096);
        collector.record(0.5).unwrap();
        collector.seal().unwrap();
        assert!(matches!(collector.record(0.5), Err(BenchError::InvalidInput(_))));
        assert!(collector.seal().is_err());
    }

    #[test]
    fn test_seal_without_samples() {
        let collector = SampleCollector::new(Direction::Write, 4096);
        collector.record_failure();
        collector.record_failure();
        assert_eq!(collector.failed_count(), 2);

        let err = collector.seal().unwrap_err();
        assert!(matches!(err, BenchError::InvalidInput(_)));
        assert!(err.to_string().contains("2 failed"));
    }

    #[test]
    fn test_concurrent_record() {
        let collector = Arc::new(SampleCollector::new(Direction::Read, 8192));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    for i in 0..250 {
                        collector.record(1e-3 + (t * 250 + i) as f64 * 1e-9).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let result = collector.seal().unwrap();
        assert_eq!(result.sample_count(), 2000);
        assert_eq!(result.latency.count, 2000);
    }
}
