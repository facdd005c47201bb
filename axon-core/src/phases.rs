//! High-level phases of an axon growth run.
//!
//! A run goes:
//! 1. [`grid_phase`]: capacity grid, built band by band in parallel.
//! 2. [`sampling_phase`]: source cells placed by density, band by band,
//!    then merged and sorted by distance to the ONH edge.
//! 3. [`growth_phase`]: every source cell routed to the ONH, one at a time
//!    in sorted order.
//! 4. [`fibre_profile`] (optional): path counts read off a circle around
//!    the ONH.

use crate::{
    cell_field::{CellField, SourceCell},
    config::Config,
    density::TabulatedDensity,
    error::Result,
    geometry::Geometry,
    grid::SpatialGrid,
    growth::{GrowthSummary, Outcome, PathGrowthEngine},
    partition::Partitioner,
};
use glam::DVec2;
use tracing::info;

/// Builds the capacity grid for `geom`.
pub fn grid_phase(geom: &Geometry, partitioner: &Partitioner) -> Result<SpatialGrid> {
    SpatialGrid::new(geom, partitioner)
}

/// Samples source cells from the configured density tables.
///
/// Fails only if the `[density]` section is malformed.
pub fn sampling_phase(
    geom: &Geometry,
    cfg: &Config,
    partitioner: &Partitioner,
) -> Result<CellField> {
    let density = TabulatedDensity::new(cfg.density.clone())?;
    Ok(CellField::sample(geom, &density, &cfg.sampling, partitioner))
}

/// Routes every source cell in `field` to the ONH.
///
/// `on_outcome` sees each cell's outcome in processing order; use it to
/// stream results out while the grid is still being mutated.
pub fn growth_phase<F>(
    engine: &mut PathGrowthEngine,
    grid: &mut SpatialGrid,
    field: &CellField,
    on_outcome: F,
) -> GrowthSummary
where
    F: FnMut(usize, &SourceCell, &Outcome, &SpatialGrid),
{
    engine.grow_all(grid, &field.cells, on_outcome)
}

/// Path count of the grid cell under each whole degree of a circle of
/// `radius_mm` around the ONH centre.
///
/// Points falling outside the grid read as zero.
pub fn fibre_profile(geom: &Geometry, grid: &SpatialGrid, radius_mm: f64) -> Vec<(u32, u32)> {
    let r = radius_mm * geom.pixels_per_mm;
    let onh = geom.onh.as_dvec2();

    let profile: Vec<(u32, u32)> = (0..360u32)
        .map(|deg| {
            let theta = f64::from(deg).to_radians();
            let p = (onh + DVec2::new(theta.cos(), theta.sin()) * r).round();
            let count = grid
                .index(geom.grid_of(p.as_ivec2()))
                .map_or(0, |idx| grid.cell(idx).count);
            (deg, count)
        })
        .collect();

    info!(
        radius_mm,
        peak = profile.iter().map(|&(_, c)| c).max().unwrap_or(0),
        "Fibre profile sampled"
    );
    profile
}
