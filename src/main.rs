//! aiosweep CLI entry point

use aiosweep::config::cli::Cli;
use aiosweep::config::{cli_convert, toml as config_file, BenchmarkConfig};
use aiosweep::engine::{create_engine, IOEngine};
use aiosweep::error::BenchError;
use aiosweep::output::{json, text};
use aiosweep::worker::LogProgress;
use aiosweep::SweepController;
use anyhow::Result;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status when the configuration is rejected before any IO
const EXIT_CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse_args();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match run(&cli, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<BenchError>() {
                Some(err) if err.is_fatal_for_sweep() => ExitCode::from(EXIT_CONFIG_ERROR),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

/// Build the configuration from `--config` if given, otherwise from the flags
///
/// clap already rejects parameter flags given alongside `--config`.
fn load_config(cli: &Cli) -> Result<BenchmarkConfig, BenchError> {
    let config = match &cli.config {
        Some(path) => config_file::load_config(path)?,
        None => cli_convert::build_config(cli)?,
    };
    aiosweep::config::validator::validate_config(&config)?;
    Ok(config)
}

/// Run the sweep; `Ok(true)` when every phase of every size succeeded
fn run(cli: &Cli, config: &BenchmarkConfig) -> Result<bool> {
    tracing::info!(
        path = %config.target_path.display(),
        sizes = ?config.sizes,
        iterations = config.iterations,
        threads = config.threads,
        queue_depth = config.queue_depth,
        block_size = config.block_size,
        engine = %config.engine,
        direct = config.direct,
        "starting sweep"
    );

    let engine_type = config.engine;
    let factory = move || -> aiosweep::Result<Box<dyn IOEngine>> { create_engine(engine_type) };
    let controller = SweepController::new(config, &factory, &LogProgress);

    let mut all_succeeded = true;
    let mut reports = Vec::with_capacity(config.sizes.len());
    controller.run_each(|report| {
        text::print_size_report(&report);
        all_succeeded &= report.succeeded();
        reports.push(report);
    })?;

    if let Some(path) = &cli.json {
        json::write_json_output(path, config, &reports)?;
        tracing::info!(path = %path.display(), "wrote JSON results");
    }

    Ok(all_succeeded)
}
