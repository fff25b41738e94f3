//! Fast timing using direct clock_gettime calls
//!
//! Latency samples are taken twice per operation on the dispatch hot path, so
//! the clock is read straight from CLOCK_MONOTONIC instead of going through
//! `std::time::Instant`.

use std::time::Duration;

/// Monotonic timestamp with nanosecond resolution
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FastInstant {
    nanos: u64,
}

impl FastInstant {
    /// Read CLOCK_MONOTONIC
    #[inline(always)]
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        // SAFETY: ts is a valid out-pointer; CLOCK_MONOTONIC always exists on Linux
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }

        Self {
            nanos: (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64),
        }
    }

    /// Duration since an earlier instant (zero if `earlier` is later)
    #[inline(always)]
    pub fn duration_since(&self, earlier: FastInstant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }

    /// Seconds since an earlier instant, as used for latency samples
    #[inline(always)]
    pub fn secs_since(&self, earlier: FastInstant) -> f64 {
        self.duration_since(earlier).as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fast_instant_basic() {
        let start = FastInstant::now();
        thread::sleep(Duration::from_millis(10));
        let end = FastInstant::now();

        let elapsed = end.duration_since(start);
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_secs(1));
        assert!((end.secs_since(start) - elapsed.as_secs_f64()).abs() < 1e-9);
    }

    #[test]
    fn test_duration_since_later_saturates() {
        let t1 = FastInstant::now();
        thread::sleep(Duration::from_millis(1));
        let t2 = FastInstant::now();

        assert!(t2 > t1);
        assert_eq!(t1.duration_since(t2), Duration::ZERO);
    }
}
