//! Command-line driver for retinal axon path growth.
//!
//! Usage: `axon-growth [config.toml]`. Without a config file the built-in
//! defaults are used. The run report goes to stdout; logs go to stderr and
//! follow `RUST_LOG`.

mod report;

use axon_core::{
    AxonError, Result,
    config::Config,
    geometry::Geometry,
    growth::PathGrowthEngine,
    partition::Partitioner,
    phases::{fibre_profile, grid_phase, growth_phase, sampling_phase},
};
use report::Report;
use std::io::{self, BufWriter};
use std::path::Path;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "axon_core=info,axon_growth=info";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Config::load(Path::new(&path))?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    run(&cfg)
}

fn run(cfg: &Config) -> Result<()> {
    let started = Instant::now();
    let geom = Geometry::from_config(cfg)?;
    let partitioner = Partitioner::new(cfg.runtime.workers)?;

    let mut report = Report::new(BufWriter::new(io::stdout().lock()), &cfg.output);
    report.header(cfg, &geom)?;

    let mut grid = grid_phase(&geom, &partitioner)?;
    let field = sampling_phase(&geom, cfg, &partitioner)?;
    report.cells(field.len())?;

    let mut engine = PathGrowthEngine::new(geom.clone(), &cfg.growth)?;
    let mut write_error: Option<io::Error> = None;
    let summary = growth_phase(&mut engine, &mut grid, &field, |i, cell, outcome, grid| {
        if write_error.is_none()
            && let Err(e) = report.outcome(i, cell, outcome, grid)
        {
            write_error = Some(e);
        }
    });
    if let Some(e) = write_error {
        return Err(AxonError::Io(e));
    }

    if let Some(radius_mm) = cfg.output.profile_radius_mm {
        report.profile(&fibre_profile(&geom, &grid, radius_mm))?;
    }
    report.summary(&summary)?;
    report.finish()?;

    info!(
        grown = summary.grown,
        failed = summary.failed(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Run complete"
    );
    Ok(())
}
