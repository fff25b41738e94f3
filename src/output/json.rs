//! JSON output
//!
//! The whole sweep is written as one document: the configuration it ran
//! with and, per size, the statistics (or error) of each phase. Raw samples
//! are included so results can be re-analysed offline.

use crate::config::BenchmarkConfig;
use crate::engine::Direction;
use crate::error::BenchError;
use crate::stats::collector::RunResult;
use crate::stats::StatisticsSummary;
use crate::sweep::SizeReport;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// How a phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonPhaseStatus {
    Ok,
    Failed,
    Skipped,
}

/// One phase of one size
#[derive(Debug, Clone, Serialize)]
pub struct JsonPhase {
    pub direction: Direction,
    pub status: JsonPhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_iterations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<StatisticsSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<StatisticsSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_samples: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_samples: Option<Vec<f64>>,
}

impl JsonPhase {
    pub fn from_result(direction: Direction, result: &std::result::Result<RunResult, BenchError>) -> Self {
        match result {
            Ok(run) => Self {
                direction,
                status: JsonPhaseStatus::Ok,
                error: None,
                failed_iterations: Some(run.failed_iterations),
                latency: Some(run.latency.clone()),
                bandwidth: Some(run.bandwidth.clone()),
                latency_samples: Some(run.latency_samples.clone()),
                bandwidth_samples: Some(run.bandwidth_samples.clone()),
            },
            Err(e) => {
                let (status, failed_iterations) = match e {
                    BenchError::PhaseSkipped { .. } => (JsonPhaseStatus::Skipped, None),
                    BenchError::IoFailure { failed, .. } => (JsonPhaseStatus::Failed, Some(*failed)),
                    _ => (JsonPhaseStatus::Failed, None),
                };
                Self {
                    direction,
                    status,
                    error: Some(e.to_string()),
                    failed_iterations,
                    latency: None,
                    bandwidth: None,
                    latency_samples: None,
                    bandwidth_samples: None,
                }
            }
        }
    }
}

/// Results for one size
#[derive(Debug, Clone, Serialize)]
pub struct JsonSizeReport {
    pub size_bytes: u64,
    pub write: JsonPhase,
    pub read: JsonPhase,
    pub cleaned_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
}

impl JsonSizeReport {
    pub fn from_report(report: &SizeReport) -> Self {
        Self {
            size_bytes: report.size_bytes,
            write: JsonPhase::from_result(Direction::Write, &report.write),
            read: JsonPhase::from_result(Direction::Read, &report.read),
            cleaned_up: report.target_created && report.cleanup.is_none(),
            cleanup_error: report.cleanup.as_ref().map(|e| e.to_string()),
        }
    }
}

/// The complete document
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    /// Seconds since the Unix epoch at which the document was produced
    pub timestamp: u64,
    pub config: &'a BenchmarkConfig,
    pub sizes: Vec<JsonSizeReport>,
}

impl<'a> JsonOutput<'a> {
    pub fn new(config: &'a BenchmarkConfig, reports: &[SizeReport]) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            timestamp,
            config,
            sizes: reports.iter().map(JsonSizeReport::from_report).collect(),
        }
    }
}

/// Write the sweep results to `output_path` as pretty-printed JSON
pub fn write_json_output(
    output_path: &Path,
    config: &BenchmarkConfig,
    reports: &[SizeReport],
) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &JsonOutput::new(config, reports))
        .with_context(|| format!("Failed to write JSON output: {}", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::collector::SampleCollector;
    use tempfile::TempDir;

    fn report() -> SizeReport {
        let collector = SampleCollector::new(Direction::Write, 1_000_000);
        collector.record(0.001).unwrap();
        collector.record(0.002).unwrap();
        collector.record_failure();

        SizeReport {
            size_bytes: 1_000_000,
            write: Ok(collector.seal().unwrap()),
            read: Err(BenchError::IoFailure {
                direction: Direction::Read,
                size_bytes: 1_000_000,
                completed: 1,
                failed: 33,
                reason: "33 consecutive failures".into(),
            }),
            cleanup: None,
            target_created: true,
        }
    }

    #[test]
    fn test_phase_serialization() {
        let value = serde_json::to_value(JsonSizeReport::from_report(&report())).unwrap();

        assert_eq!(value["size_bytes"], 1_000_000);
        assert_eq!(value["cleaned_up"], true);
        assert!(value.get("cleanup_error").is_none());

        let write = &value["write"];
        assert_eq!(write["direction"], "write");
        assert_eq!(write["status"], "ok");
        assert_eq!(write["failed_iterations"], 1);
        assert_eq!(write["latency"]["count"], 2);
        assert_eq!(write["latency_samples"].as_array().unwrap().len(), 2);
        assert!(write["latency"]["percentiles"]["50th"].is_number());
        assert!((write["bandwidth"]["max"].as_f64().unwrap() - 1000.0).abs() < 1e-9);

        let read = &value["read"];
        assert_eq!(read["status"], "failed");
        assert_eq!(read["failed_iterations"], 33);
        assert!(read["error"].as_str().unwrap().contains("consecutive failures"));
        assert!(read.get("latency").is_none());
    }

    #[test]
    fn test_skipped_phase() {
        let phase = JsonPhase::from_result(
            Direction::Read,
            &Err(BenchError::PhaseSkipped {
                direction: Direction::Read,
                reason: "write phase failed".into(),
            }),
        );
        assert_eq!(phase.status, JsonPhaseStatus::Skipped);
        assert!(phase.failed_iterations.is_none());
    }

    #[test]
    fn test_write_json_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        let config = BenchmarkConfig::default();

        write_json_output(&path, &config, &[report()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["config"]["iterations"], 200);
        assert_eq!(value["sizes"].as_array().unwrap().len(), 1);
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_write_json_output_bad_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("results.json");
        assert!(write_json_output(&path, &BenchmarkConfig::default(), &[]).is_err());
    }
}
