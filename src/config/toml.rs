//! TOML configuration file support
//!
//! A configuration file mirrors the command line flags. Sizes are written as
//! strings so the same K/M/G suffixes work:
//!
//! ```toml
//! nvme_path = "/mnt/nvme/bench"
//! sizes = ["2M", "8M", "32M"]
//! iterations = 200
//! threads = 16
//! queue_depth = 64
//! block_size = "2M"
//! engine = "io_uring"
//! direct = false
//! failure_threshold = 32
//! ```
//!
//! Missing keys fall back to the CLI defaults.

use super::cli_convert::parse_size;
use super::{BenchmarkConfig, EngineType};
use crate::error::BenchError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// On-disk configuration layout
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    nvme_path: Option<PathBuf>,
    sizes: Option<Vec<String>>,
    iterations: Option<usize>,
    threads: Option<usize>,
    queue_depth: Option<usize>,
    block_size: Option<String>,
    engine: Option<EngineType>,
    direct: Option<bool>,
    failure_threshold: Option<usize>,
}

/// Load a benchmark configuration from a TOML file
pub fn load_config(path: &Path) -> Result<BenchmarkConfig, BenchError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BenchError::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;
    parse_config(&content)
}

/// Parse a benchmark configuration from TOML text
pub fn parse_config(content: &str) -> Result<BenchmarkConfig, BenchError> {
    let file: ConfigFile = ::toml::from_str(content)
        .map_err(|e| BenchError::Config(format!("failed to parse TOML config: {}", e)))?;

    let defaults = BenchmarkConfig::default();

    let sizes = match file.sizes {
        Some(ref sizes) => sizes
            .iter()
            .map(|s| parse_size(s))
            .collect::<Result<Vec<_>, _>>()?,
        None => defaults.sizes,
    };
    let block_size = match file.block_size {
        Some(ref s) => parse_size(s)?,
        None => defaults.block_size,
    };

    Ok(BenchmarkConfig {
        target_path: file.nvme_path.unwrap_or(defaults.target_path),
        sizes,
        iterations: file.iterations.unwrap_or(defaults.iterations),
        threads: file.threads.unwrap_or(defaults.threads),
        queue_depth: file.queue_depth.unwrap_or(defaults.queue_depth),
        block_size,
        engine: file.engine.unwrap_or(defaults.engine),
        direct: file.direct.unwrap_or(defaults.direct),
        failure_threshold: file.failure_threshold.unwrap_or(defaults.failure_threshold),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            nvme_path = "/data/bench"
            sizes = ["4K", "1M"]
            iterations = 50
            threads = 4
            queue_depth = 8
            block_size = "256K"
            engine = "sync"
            direct = true
            failure_threshold = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.target_path, PathBuf::from("/data/bench"));
        assert_eq!(config.sizes, vec![4096, 1_048_576]);
        assert_eq!(config.iterations, 50);
        assert_eq!(config.threads, 4);
        assert_eq!(config.queue_depth, 8);
        assert_eq!(config.block_size, 262_144);
        assert_eq!(config.engine, EngineType::Sync);
        assert!(config.direct);
        assert_eq!(config.failure_threshold, 3);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = parse_config("iterations = 7").unwrap();
        let defaults = BenchmarkConfig::default();
        assert_eq!(config.iterations, 7);
        assert_eq!(config.sizes, defaults.sizes);
        assert_eq!(config.queue_depth, defaults.queue_depth);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            parse_config("read_percent = 50"),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_bad_size_rejected() {
        assert!(matches!(
            parse_config(r#"sizes = ["lots"]"#),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "threads = 2").unwrap();
        writeln!(file, "sizes = [\"8K\"]").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.sizes, vec![8192]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config(Path::new("/nonexistent/aiosweep.toml"));
        assert!(matches!(result, Err(BenchError::Config(_))));
    }
}
