//! Conversion from CLI arguments to a [`BenchmarkConfig`]

use super::cli::{Cli, EngineChoice};
use super::{BenchmarkConfig, EngineType};
use crate::error::BenchError;

/// Parse a human-readable size (e.g., "4K", "2M", "1.5G") to bytes
///
/// Suffixes are binary multiples and case-insensitive. Fractional values are
/// accepted and truncated to whole bytes.
pub fn parse_size(s: &str) -> Result<u64, BenchError> {
    let s = s.trim().to_uppercase();
    if s.is_empty() {
        return Err(BenchError::Config("empty size string".into()));
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('K') {
        (n, 1024u64)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('T') {
        (n, 1024 * 1024 * 1024 * 1024)
    } else {
        (s.as_str(), 1)
    };

    if let Ok(whole) = num_str.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| BenchError::Config(format!("size overflows: {}", s)));
    }

    let num: f64 = num_str
        .parse()
        .map_err(|_| BenchError::Config(format!("invalid size format: {}", s)))?;
    if !num.is_finite() || num < 0.0 {
        return Err(BenchError::Config(format!("invalid size format: {}", s)));
    }

    let bytes = num * multiplier as f64;
    if bytes >= u64::MAX as f64 {
        return Err(BenchError::Config(format!("size overflows: {}", s)));
    }
    Ok(bytes as u64)
}

/// Map the CLI engine choice onto the configuration type
pub fn convert_engine_type(choice: Option<EngineChoice>) -> EngineType {
    match choice {
        Some(EngineChoice::IoUring) => EngineType::IoUring,
        Some(EngineChoice::Sync) => EngineType::Sync,
        None => EngineType::default(),
    }
}

/// Build a benchmark configuration from parsed CLI arguments
///
/// Only parses; range checks live in [`super::validator`].
pub fn build_config(cli: &Cli) -> Result<BenchmarkConfig, BenchError> {
    let sizes = cli
        .sizes
        .iter()
        .map(|s| parse_size(s))
        .collect::<Result<Vec<_>, _>>()?;
    let block_size = parse_size(&cli.block_size)?;

    Ok(BenchmarkConfig {
        target_path: cli.nvme_path.clone(),
        sizes,
        iterations: cli.iterations,
        threads: cli.threads,
        queue_depth: cli.queue_depth,
        block_size,
        engine: convert_engine_type(cli.engine),
        direct: cli.direct,
        failure_threshold: cli.failure_threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("4K").unwrap(), 4096);
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size(" 1G ").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1T").unwrap(), 1024u64.pow(4));
    }

    #[test]
    fn test_parse_size_fractional() {
        assert_eq!(parse_size("1.5M").unwrap(), 1_572_864);
        assert_eq!(parse_size("0.5K").unwrap(), 512);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(matches!(parse_size(""), Err(BenchError::Config(_))));
        assert!(matches!(parse_size("abc"), Err(BenchError::Config(_))));
        assert!(matches!(parse_size("-1M"), Err(BenchError::Config(_))));
        assert!(matches!(parse_size("2X"), Err(BenchError::Config(_))));
        assert!(matches!(parse_size("99999999999T"), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_build_config_from_cli() {
        let cli = Cli::try_parse_from([
            "aiosweep",
            "--nvme-path",
            "/tmp/bench",
            "--sizes",
            "1M",
            "4M",
            "--iterations",
            "10",
            "--block-size",
            "512K",
            "--engine",
            "sync",
        ])
        .unwrap();

        let config = build_config(&cli).unwrap();
        assert_eq!(config.target_path, std::path::PathBuf::from("/tmp/bench"));
        assert_eq!(config.sizes, vec![1_048_576, 4_194_304]);
        assert_eq!(config.iterations, 10);
        assert_eq!(config.block_size, 524_288);
        assert_eq!(config.engine, EngineType::Sync);
    }

    #[test]
    fn test_build_config_bad_size_is_config_error() {
        let cli = Cli::try_parse_from(["aiosweep", "--sizes", "2Q"]).unwrap();
        assert!(matches!(build_config(&cli), Err(BenchError::Config(_))));
    }
}
