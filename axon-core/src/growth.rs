//! Capacity-constrained path growth toward the ONH.
//!
//! Source cells are processed one at a time, nearest to the ONH first. Each
//! cell's axon follows an existing route whenever it can: first the routing
//! memo already stored on its own grid cell, otherwise the grid cell of the
//! nearest cell that already reached the ONH. Wherever the route ahead is
//! full, a directional detour search picks the nearest cell with room past
//! the blocked one, within a cone around the blocked direction, and the route
//! continues from there.
//!
//! The loop for one cell:
//! 1. Cells close to the ONH edge attach straight to the sink.
//! 2. Otherwise pick the first target (own memo, or nearest completed cell).
//! 3. Walk: step into the target if it has room, else detour around it.
//! 4. Stop at the sink (success) or when a detour finds nothing (failure).
//! 5. Clear every visit flag set along the way.
//!
//! Growth mutates the shared grid in a fixed order and must run on one
//! thread; the engine takes `&mut SpatialGrid` for the whole batch.

use crate::cell_field::SourceCell;
use crate::config::GrowthConfig;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::grid::SpatialGrid;
use crate::scan_points::ScanPointTable;
use crate::types::{GridIdx, Hemisphere};
use glam::IVec2;
use thiserror::Error;
use tracing::{debug, info};

/// Why a single source cell could not be connected. Never fatal for the run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthFailure {
    #[error("no completed neighbour with room to attach to")]
    NoCompletedNeighbour,

    #[error("detour search exhausted at grid cell ({}, {})", .at.x, .at.y)]
    DetourExhausted { at: IVec2 },

    #[error("source cell lies outside the grid")]
    OutsideGrid,
}

/// A successfully connected source cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrownPath {
    /// Grid coordinate the path starts from.
    pub start: IVec2,
    /// Grid coordinate the path ends at; always the ONH sink.
    pub end: IVec2,
    /// Memo edges followed from `start` to the sink.
    pub hops: u32,
    /// True if the cell attached straight to the sink.
    pub direct: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Grown(GrownPath),
    Failed(GrowthFailure),
}

impl Outcome {
    pub fn is_grown(&self) -> bool {
        matches!(self, Outcome::Grown(_))
    }
}

/// Tallies of a growth batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrowthSummary {
    pub grown: usize,
    pub direct: usize,
    pub no_neighbour: usize,
    pub detour_exhausted: usize,
    pub outside_grid: usize,
    pub total_hops: u64,
}

impl GrowthSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Grown(p) => {
                self.grown += 1;
                self.direct += usize::from(p.direct);
                self.total_hops += u64::from(p.hops);
            }
            Outcome::Failed(GrowthFailure::NoCompletedNeighbour) => self.no_neighbour += 1,
            Outcome::Failed(GrowthFailure::DetourExhausted { .. }) => self.detour_exhausted += 1,
            Outcome::Failed(GrowthFailure::OutsideGrid) => self.outside_grid += 1,
        }
    }

    pub fn failed(&self) -> usize {
        self.no_neighbour + self.detour_exhausted + self.outside_grid
    }

    pub fn processed(&self) -> usize {
        self.grown + self.failed()
    }
}

pub struct PathGrowthEngine {
    geometry: Geometry,
    scan: ScanPointTable,
    /// Detour cone half-width, in radians.
    tolerance: f64,
    tie_break: Hemisphere,
    /// Cells flagged by the path under construction; the origin comes first.
    visited: Vec<GridIdx>,
}

impl PathGrowthEngine {
    pub fn new(geometry: Geometry, growth: &GrowthConfig) -> Result<Self> {
        let scan = ScanPointTable::new(growth.scan_radius)?;
        info!(
            radius = scan.radius(),
            entries = scan.len(),
            "Scan point table ready"
        );
        Ok(Self {
            geometry,
            scan,
            tolerance: growth.angular_tolerance_deg.to_radians(),
            tie_break: growth.raphe_tie_break,
            visited: Vec::with_capacity(64),
        })
    }

    /// Grows every cell in slice order and collects the outcomes.
    pub fn grow(&mut self, grid: &mut SpatialGrid, cells: &[SourceCell]) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(cells.len());
        self.grow_all(grid, cells, |_, _, o, _| outcomes.push(*o));
        outcomes
    }

    /// Grows every cell in slice order, reporting each outcome as it lands
    /// together with the grid as it stands right after that cell.
    ///
    /// A cell may only attach to cells earlier in `cells` that grew
    /// successfully, so the order matters; pass a [`crate::cell_field::CellField`]'s
    /// cells to get the nearest-first order.
    pub fn grow_all<F>(
        &mut self,
        grid: &mut SpatialGrid,
        cells: &[SourceCell],
        mut on_outcome: F,
    ) -> GrowthSummary
    where
        F: FnMut(usize, &SourceCell, &Outcome, &SpatialGrid),
    {
        info!(cells = cells.len(), "Growing paths");
        let mut completed = vec![false; cells.len()];
        let mut summary = GrowthSummary::default();

        for (i, cell) in cells.iter().enumerate() {
            let outcome = self.grow_one(grid, cells, &completed, i);
            if let Outcome::Failed(reason) = &outcome {
                debug!(x = cell.pos.x, y = cell.pos.y, %reason, "Path growth failed");
            }
            completed[i] = outcome.is_grown();
            summary.record(&outcome);
            on_outcome(i, cell, &outcome, grid);
        }

        info!(
            grown = summary.grown,
            direct = summary.direct,
            failed = summary.failed(),
            "Growth finished"
        );
        summary
    }

    fn grow_one(
        &mut self,
        grid: &mut SpatialGrid,
        cells: &[SourceCell],
        completed: &[bool],
        i: usize,
    ) -> Outcome {
        let source = cells[i];
        let Some(origin) = grid.index(self.geometry.grid_of(source.pos)) else {
            return Outcome::Failed(GrowthFailure::OutsideGrid);
        };

        if source.dist_to_onh_edge < self.geometry.direct_attach {
            return Outcome::Grown(attach_direct(grid, origin));
        }

        let first = match grid.next_hop(origin) {
            Some(t) => t,
            None => match self.nearest_completed(grid, cells, completed, i, origin) {
                Some(t) => t,
                None => return Outcome::Failed(GrowthFailure::NoCompletedNeighbour),
            },
        };
        let hemisphere = self
            .geometry
            .hemisphere_of(source.pos)
            .unwrap_or(self.tie_break);

        grid.set_flag(origin);
        self.visited.push(origin);
        let outcome = self.extend(grid, origin, first, hemisphere);
        for idx in self.visited.drain(..) {
            grid.clear_flag(idx);
        }
        outcome
    }

    /// Nearest earlier cell that reached the ONH and whose grid cell can take
    /// one more path without crossing the raphe.
    fn nearest_completed(
        &self,
        grid: &SpatialGrid,
        cells: &[SourceCell],
        completed: &[bool],
        i: usize,
        origin: GridIdx,
    ) -> Option<GridIdx> {
        let me = &cells[i];
        let from = grid.coord(origin);
        // Euclidean distance >= difference in edge distance minus this.
        let slack = self.geometry.onh_edge_spread();
        let mut best: Option<(f64, GridIdx)> = None;

        for j in (0..i).rev() {
            let other = &cells[j];
            if let Some((d, _)) = best
                && me.dist_to_onh_edge - other.dist_to_onh_edge > d + slack
            {
                break;
            }
            if !completed[j] {
                continue;
            }
            let g = self.geometry.grid_of(other.pos);
            let Some(idx) = grid.index(g) else { continue };
            if idx == origin || !grid.has_room(idx) {
                continue;
            }
            if !grid.is_sink(idx) && self.geometry.crosses_raphe(from, g) {
                continue;
            }
            let d = (me.pos - other.pos).as_dvec2().length();
            if best.is_none_or(|(b, _)| d < b) {
                best = Some((d, idx));
            }
        }
        best.map(|(_, idx)| idx)
    }

    /// Walks from `origin` toward the sink, detouring around full cells.
    ///
    /// Usage is committed only when the sink is reached. Each cell is entered
    /// at most once per walk, so checking room before entering is the same as
    /// counting as we go.
    fn extend(
        &mut self,
        grid: &mut SpatialGrid,
        origin: GridIdx,
        first: GridIdx,
        hemisphere: Hemisphere,
    ) -> Outcome {
        let mut current = origin;
        let mut target = Some(first);
        let mut hops = 0u32;

        loop {
            match target {
                Some(t) if grid.is_sink(t) => {
                    grid.set_next_hop(current, Some(t));
                    hops += 1;
                    for &idx in &self.visited[1..] {
                        grid.consume(idx);
                    }
                    grid.consume(t);
                    return Outcome::Grown(GrownPath {
                        start: grid.coord(origin),
                        end: grid.coord(t),
                        hops,
                        direct: false,
                    });
                }
                Some(t) if !grid.is_flagged(t) && grid.has_room(t) => {
                    grid.set_flag(t);
                    self.visited.push(t);
                    grid.set_next_hop(current, Some(t));
                    hops += 1;
                    current = t;
                    target = grid.next_hop(t);
                }
                blocked => {
                    match self.detour(grid, current, blocked, hemisphere) {
                        Some(found) => {
                            if let Some(b) = blocked {
                                self.inherit_continuation(grid, found, b);
                            }
                            target = Some(found);
                        }
                        None => {
                            if let Some(b) = blocked {
                                grid.set_next_hop(b, None);
                            }
                            return Outcome::Failed(GrowthFailure::DetourExhausted {
                                at: grid.coord(current),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Nearest cell past the `blocked` target, within the cone pointing
    /// from `current` at it, that can carry this path.
    ///
    /// With no target the search is centred on `current` and aimed at the
    /// sink.
    fn detour(
        &self,
        grid: &SpatialGrid,
        current: GridIdx,
        blocked: Option<GridIdx>,
        hemisphere: Hemisphere,
    ) -> Option<GridIdx> {
        let from = grid.coord(current);
        let (centre, toward) = match blocked {
            Some(b) => (grid.coord(b), grid.coord(b)),
            None => (from, grid.coord(grid.sink())),
        };
        let d = toward - from;
        if d == IVec2::ZERO {
            return None;
        }
        let bearing = f64::from(d.y).atan2(f64::from(d.x));

        self.scan
            .within_cone(bearing, self.tolerance)
            .find_map(|sp| {
                let g = centre + sp.offset;
                let idx = grid.index(g)?;
                if grid.is_flagged(idx) || !grid.has_room(idx) {
                    return None;
                }
                // The hop actually taken is current -> g.
                if !grid.is_sink(idx)
                    && (self.geometry.crosses_raphe(centre, g)
                        || self.geometry.crosses_raphe(from, g)
                        || self.geometry.off_hemisphere(g, hemisphere))
                {
                    return None;
                }
                Some(idx)
            })
    }

    /// Lets a detour cell without a route of its own continue where the
    /// blocked cell's route went.
    fn inherit_continuation(&self, grid: &mut SpatialGrid, found: GridIdx, blocked: GridIdx) {
        if grid.is_sink(found) || grid.next_hop(found).is_some() {
            return;
        }
        let Some(cont) = grid.next_hop(blocked) else {
            return;
        };
        if cont == found {
            return;
        }
        if grid.is_sink(cont)
            || !self
                .geometry
                .crosses_raphe(grid.coord(found), grid.coord(cont))
        {
            grid.set_next_hop(found, Some(cont));
        }
    }
}

/// Single hop from `origin` straight into the sink.
fn attach_direct(grid: &mut SpatialGrid, origin: GridIdx) -> GrownPath {
    let sink = grid.sink();
    if !grid.is_sink(origin) {
        grid.set_next_hop(origin, Some(sink));
        grid.try_consume(origin);
    }
    grid.consume(sink);
    GrownPath {
        start: grid.coord(origin),
        end: grid.coord(sink),
        hops: 1,
        direct: true,
    }
}
