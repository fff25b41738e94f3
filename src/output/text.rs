//! Human-readable text output

use crate::error::BenchError;
use crate::stats::collector::RunResult;
use crate::stats::StatisticsSummary;
use crate::sweep::SizeReport;
use std::fmt::Write;

/// Print one size's report to stdout
pub fn print_size_report(report: &SizeReport) {
    print!("{}", format_size_report(report));
}

/// Render one size's report
///
/// ```text
/// Benchmarking size: 2097152 bytes
/// Write Statistics:
///   Latency Mean: 0.001234567s
///   ...
/// Read Statistics:
///   ...
/// Cleaned up files for size 2097152
/// ```
pub fn format_size_report(report: &SizeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Benchmarking size: {} bytes", report.size_bytes);
    out.push_str(&format_phase("Write", &report.write));
    out.push_str(&format_phase("Read", &report.read));

    if report.target_created {
        match &report.cleanup {
            None => {
                let _ = writeln!(out, "Cleaned up files for size {}", report.size_bytes);
            }
            Some(e) => {
                let _ = writeln!(out, "Failed to clean up files for size {}: {}", report.size_bytes, e);
            }
        }
    }
    out
}

fn format_phase(label: &str, result: &Result<RunResult, BenchError>) -> String {
    let mut out = String::new();
    match result {
        Ok(run) => {
            let _ = writeln!(out, "{} Statistics:", label);
            write_latency(&mut out, &run.latency);
            write_bandwidth(&mut out, &run.bandwidth);
            if run.failed_iterations > 0 {
                let _ = writeln!(out, "  Failed Iterations: {}", run.failed_iterations);
            }
        }
        Err(e) => {
            let _ = writeln!(out, "{} Statistics: unavailable ({})", label, e);
        }
    }
    out
}

fn write_latency(out: &mut String, s: &StatisticsSummary) {
    let _ = writeln!(out, "  Latency Mean: {:.9}s", s.mean);
    let _ = writeln!(out, "  Latency Median: {:.9}s", s.median);
    let _ = writeln!(out, "  Latency Std Dev: {:.9}s", s.std_dev);
    let _ = writeln!(
        out,
        "  Latency 95% CI: ({:.9}, {:.9})",
        s.confidence_interval.lower, s.confidence_interval.upper
    );
    let _ = writeln!(out, "  Latency Percentiles: {}", format_percentiles(s));
}

fn write_bandwidth(out: &mut String, s: &StatisticsSummary) {
    let _ = writeln!(out, "  Bandwidth Mean: {:.3} MB/s", s.mean);
    let _ = writeln!(out, "  Bandwidth Median: {:.3} MB/s", s.median);
    let _ = writeln!(out, "  Bandwidth Std Dev: {:.3} MB/s", s.std_dev);
    let _ = writeln!(
        out,
        "  Bandwidth 95% CI: ({:.3}, {:.3})",
        s.confidence_interval.lower, s.confidence_interval.upper
    );
    let _ = writeln!(out, "  Bandwidth Percentiles: {}", format_percentiles(s));
}

fn format_percentiles(s: &StatisticsSummary) -> String {
    format!(
        "{{'50th': {}, '90th': {}, '99th': {}}}",
        repr_float(s.percentiles.p50),
        repr_float(s.percentiles.p90),
        repr_float(s.percentiles.p99)
    )
}

/// Shortest round-trip rendering that always reads as a float
///
/// Fixed notation keeps a decimal point (`1000.0`). Values below 1e-4 or from
/// 1e16 up switch to exponent notation with a signed two-digit exponent
/// (`5e-07`, `1e+16`).
fn repr_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let sci = format!("{:e}", v);
        if let Some((mantissa, exp)) = sci.split_once('e') {
            if let Ok(exp) = exp.parse::<i32>() {
                let sign = if exp < 0 { '-' } else { '+' };
                return format!("{}e{}{:02}", mantissa, sign, exp.unsigned_abs());
            }
        }
        return sci;
    }

    let fixed = v.to_string();
    if fixed.contains('.') {
        fixed
    } else {
        fixed + ".0"
    }
}
