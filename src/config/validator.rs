//! Configuration validation

use super::*;
use crate::error::BenchError;

/// Alignment required for O_DIRECT transfers
const DIRECT_IO_ALIGNMENT: u64 = 512;

/// Validate a complete benchmark configuration
///
/// Runs before any IO is issued; every failure is a [`BenchError::Config`].
pub fn validate_config(config: &BenchmarkConfig) -> Result<(), BenchError> {
    if config.sizes.is_empty() {
        return Err(BenchError::Config("at least one size is required".into()));
    }

    for &size in &config.sizes {
        if size == 0 {
            return Err(BenchError::Config("sizes must be greater than 0".into()));
        }
        if size.checked_mul(config.iterations as u64).is_none() {
            return Err(BenchError::Config(format!(
                "size {} x {} iterations overflows the target region",
                size, config.iterations
            )));
        }
        if size > usize::MAX as u64 {
            return Err(BenchError::Config(format!("size {} does not fit in memory", size)));
        }
    }

    if config.iterations == 0 {
        return Err(BenchError::Config("iterations must be at least 1".into()));
    }

    if config.threads == 0 {
        return Err(BenchError::Config("threads must be at least 1".into()));
    }

    if config.queue_depth == 0 {
        return Err(BenchError::Config("queue_depth must be at least 1".into()));
    }

    if config.block_size == 0 {
        return Err(BenchError::Config("block_size must be greater than 0".into()));
    }

    // Engine submissions carry a 32-bit length
    if config.block_size > u32::MAX as u64 {
        return Err(BenchError::Config(format!(
            "block_size {} exceeds the maximum single submission ({} bytes)",
            config.block_size,
            u32::MAX
        )));
    }

    if config.direct {
        validate_direct_alignment(config)?;
    }

    if !config.block_size.is_power_of_two() {
        tracing::warn!(
            block_size = config.block_size,
            "block_size is not a power of 2"
        );
    }

    if config.queue_depth < config.threads {
        tracing::warn!(
            queue_depth = config.queue_depth,
            threads = config.threads,
            "queue_depth is below the thread count; only {} workers will run",
            config.queue_depth
        );
    }

    Ok(())
}

/// O_DIRECT requires sector-aligned lengths and offsets
fn validate_direct_alignment(config: &BenchmarkConfig) -> Result<(), BenchError> {
    for &size in &config.sizes {
        if size % DIRECT_IO_ALIGNMENT != 0 {
            return Err(BenchError::Config(format!(
                "size {} must be a multiple of {} bytes with direct IO",
                size, DIRECT_IO_ALIGNMENT
            )));
        }
    }

    if config.block_size % DIRECT_IO_ALIGNMENT != 0 {
        return Err(BenchError::Config(format!(
            "block_size {} must be a multiple of {} bytes with direct IO",
            config.block_size, DIRECT_IO_ALIGNMENT
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_config() -> BenchmarkConfig {
        BenchmarkConfig {
            target_path: PathBuf::from("/tmp/aiosweep"),
            sizes: vec![1024 * 1024],
            iterations: 10,
            threads: 2,
            queue_depth: 4,
            block_size: 1024 * 1024,
            engine: EngineType::Sync,
            direct: false,
            failure_threshold: 4,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
        assert!(validate_config(&BenchmarkConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = valid_config();
        config.iterations = 0;
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));

        let mut config = valid_config();
        config.threads = 0;
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));

        let mut config = valid_config();
        config.queue_depth = 0;
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));

        let mut config = valid_config();
        config.block_size = 0;
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));

        let mut config = valid_config();
        config.sizes = vec![4096, 0];
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_empty_sizes_rejected() {
        let mut config = valid_config();
        config.sizes.clear();
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_region_overflow_rejected() {
        let mut config = valid_config();
        config.sizes = vec![u64::MAX / 2];
        config.iterations = 4;
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_direct_io_alignment() {
        let mut config = valid_config();
        config.direct = true;
        assert!(validate_config(&config).is_ok());

        config.sizes = vec![1000];
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));

        let mut config = valid_config();
        config.direct = true;
        config.block_size = 4000;
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_oversized_block_rejected() {
        let mut config = valid_config();
        config.block_size = 8 * 1024 * 1024 * 1024;
        assert!(matches!(validate_config(&config), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_queue_depth_below_threads_allowed() {
        let mut config = valid_config();
        config.threads = 8;
        config.queue_depth = 2;
        assert!(validate_config(&config).is_ok());
    }
}
