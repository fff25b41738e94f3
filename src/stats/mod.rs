//! Statistics
//!
//! Descriptive statistics over latency and bandwidth samples, plus the
//! lock-free [`SampleCollector`](collector::SampleCollector) workers record into.
//!
//! Every figure is computed from the raw sample sequence; nothing is
//! approximated through histograms, so percentiles are exact for the samples
//! observed.
//!
//! # Example
//!
//! ```
//! use aiosweep::stats::summarize;
//!
//! let summary = summarize(&[0.001, 0.002, 0.003]).unwrap();
//! assert!((summary.mean - 0.002).abs() < 1e-12);
//! assert_eq!(summary.percentiles.p50, 0.002);
//! assert!(summary.confidence_interval.lower < summary.mean);
//! ```

pub mod collector;
pub mod student_t;

use crate::error::BenchError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-line aligned atomic counter
///
/// Workers bump shared counters from every completion, so each counter gets
/// its own cache line to keep them from false sharing.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct AlignedCounter {
    value: AtomicU64,
}

impl AlignedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `val` and return the updated count
    #[inline]
    pub fn add(&self, val: u64) -> u64 {
        self.value.fetch_add(val, Ordering::Relaxed) + val
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Two-sided 95% confidence interval for the mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// The reported percentiles, linearly interpolated
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    #[serde(rename = "50th")]
    pub p50: f64,
    #[serde(rename = "90th")]
    pub p90: f64,
    #[serde(rename = "99th")]
    pub p99: f64,
}

/// Descriptive statistics over one sample sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator); zero for a single sample
    pub std_dev: f64,
    pub confidence_interval: ConfidenceInterval,
    pub percentiles: Percentiles,
    pub min: f64,
    pub max: f64,
}

/// Compute the summary of a sample sequence
///
/// # Errors
///
/// [`BenchError::InvalidInput`] if `samples` is empty or contains a NaN or
/// infinite value.
pub fn summarize(samples: &[f64]) -> Result<StatisticsSummary, BenchError> {
    if samples.is_empty() {
        return Err(BenchError::InvalidInput(
            "cannot summarize an empty sample sequence".to_string(),
        ));
    }
    if let Some(bad) = samples.iter().find(|v| !v.is_finite()) {
        return Err(BenchError::InvalidInput(format!(
            "sample sequence contains non-finite value {}",
            bad
        )));
    }

    let n = samples.len();
    let mean = samples.iter().sum::<f64>() / n as f64;

    // Two-pass variance avoids the cancellation of the sum-of-squares form
    let std_dev = if n > 1 {
        let sum_sq: f64 = samples.iter().map(|v| (v - mean) * (v - mean)).sum();
        (sum_sq / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    let half_width = if n > 1 {
        student_t::t_critical_95(n - 1) * std_dev / (n as f64).sqrt()
    } else {
        0.0
    };

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok(StatisticsSummary {
        count: n,
        mean,
        median: percentile_sorted(&sorted, 50.0),
        std_dev,
        confidence_interval: ConfidenceInterval {
            lower: mean - half_width,
            upper: mean + half_width,
        },
        percentiles: Percentiles {
            p50: percentile_sorted(&sorted, 50.0),
            p90: percentile_sorted(&sorted, 90.0),
            p99: percentile_sorted(&sorted, 99.0),
        },
        min: sorted[0],
        max: sorted[n - 1],
    })
}

/// Percentile `p` (0..=100) of `samples` with linear interpolation
///
/// The rank is `p / 100 * (n - 1)` over the ascending samples; the result is
/// interpolated between the two neighbouring order statistics.
pub fn percentile(samples: &[f64], p: f64) -> Result<f64, BenchError> {
    if samples.is_empty() {
        return Err(BenchError::InvalidInput(
            "cannot take a percentile of an empty sample sequence".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&p) {
        return Err(BenchError::InvalidInput(format!(
            "percentile {} outside 0..=100",
            p
        )));
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(percentile_sorted(&sorted, p))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Bandwidth in MB/s (10^6 bytes per second) for `bytes` moved in `secs`
#[inline]
pub fn bandwidth_mb_s(bytes: u64, secs: f64) -> f64 {
    bytes as f64 / secs / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_basic() {
        let s = summarize(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(s.count, 5);
        assert!((s.mean - 3.0).abs() < 1e-12);
        assert!((s.median - 3.0).abs() < 1e-12);
        assert!((s.std_dev - 2.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);

        // t(4) = 2.7764451
        let half = 2.776_445_1 * 2.5f64.sqrt() / 5f64.sqrt();
        assert!((s.confidence_interval.lower - (3.0 - half)).abs() < 1e-6);
        assert!((s.confidence_interval.upper - (3.0 + half)).abs() < 1e-6);
    }

    #[test]
    fn test_single_sample() {
        let s = summarize(&[0.25]).unwrap();
        assert_eq!(s.mean, 0.25);
        assert_eq!(s.median, 0.25);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.confidence_interval.lower, 0.25);
        assert_eq!(s.confidence_interval.upper, 0.25);
        assert_eq!(s.percentiles.p50, 0.25);
        assert_eq!(s.percentiles.p99, 0.25);
    }

    #[test]
    fn test_identical_samples() {
        let s = summarize(&[0.001; 10]).unwrap();
        assert!((s.mean - 0.001).abs() < 1e-15);
        assert!(s.std_dev.abs() < 1e-15);
        assert!((s.confidence_interval.lower - s.mean).abs() < 1e-15);
        assert!((s.confidence_interval.upper - s.mean).abs() < 1e-15);
        assert_eq!(s.percentiles.p90, 0.001);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(summarize(&[]), Err(BenchError::InvalidInput(_))));
        assert!(matches!(percentile(&[], 50.0), Err(BenchError::InvalidInput(_))));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            summarize(&[1.0, f64::NAN]),
            Err(BenchError::InvalidInput(_))
        ));
        assert!(matches!(
            summarize(&[f64::INFINITY]),
            Err(BenchError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_percentile_interpolation() {
        let samples = [10.0, 20.0, 30.0, 40.0];
        // rank = 0.5 * 3 = 1.5
        assert!((percentile(&samples, 50.0).unwrap() - 25.0).abs() < 1e-12);
        // rank = 0.9 * 3 = 2.7
        assert!((percentile(&samples, 90.0).unwrap() - 37.0).abs() < 1e-12);
        assert_eq!(percentile(&samples, 0.0).unwrap(), 10.0);
        assert_eq!(percentile(&samples, 100.0).unwrap(), 40.0);
        assert!(percentile(&samples, 101.0).is_err());
    }

    #[test]
    fn test_percentile_ignores_input_order() {
        let shuffled = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&shuffled, 50.0).unwrap(), 3.0);
        assert!((percentile(&shuffled, 90.0).unwrap() - 4.6).abs() < 1e-12);
    }

    #[test]
    fn test_ordering_properties() {
        let samples: Vec<f64> = (1..=200).map(|i| (i as f64).sqrt() * 1e-3).collect();
        let s = summarize(&samples).unwrap();
        assert!(s.min <= s.percentiles.p50);
        assert!(s.percentiles.p50 <= s.percentiles.p90);
        assert!(s.percentiles.p90 <= s.percentiles.p99);
        assert!(s.percentiles.p99 <= s.max);
        assert_eq!(s.median, s.percentiles.p50);
        assert!(s.confidence_interval.lower <= s.mean);
        assert!(s.mean <= s.confidence_interval.upper);
    }

    #[test]
    fn test_bandwidth() {
        assert!((bandwidth_mb_s(1_048_576, 0.001) - 1048.576).abs() < 1e-9);
        assert!((bandwidth_mb_s(2_000_000, 2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_aligned_counter() {
        let counter = AlignedCounter::new();
        counter.add(3);
        assert_eq!(counter.add(4), 7);
        assert_eq!(counter.get(), 7);
        assert_eq!(std::mem::align_of::<AlignedCounter>(), 64);
    }
}
