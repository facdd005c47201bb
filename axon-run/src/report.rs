//! Plain-text run report written to stdout.
//!
//! Comment lines start with `# `. Each grown path is one line of
//! `start_x start_y end_x end_y hops` in grid coordinates.

use axon_core::{
    cell_field::SourceCell,
    config::{Config, OutputConfig},
    geometry::Geometry,
    grid::SpatialGrid,
    growth::{GrowthFailure, GrowthSummary, Outcome},
};
use std::io::{self, Write};

pub struct Report<W: Write> {
    out: W,
    route_every: Option<usize>,
}

impl<W: Write> Report<W> {
    pub fn new(out: W, output: &OutputConfig) -> Self {
        Self {
            out,
            route_every: output.print_route_every.filter(|&n| n > 0),
        }
    }

    /// Echoes the run constants.
    pub fn header(&mut self, cfg: &Config, geom: &Geometry) -> io::Result<()> {
        let w = &mut self.out;
        writeln!(w, "# scan_radius        {:>10}", cfg.growth.scan_radius)?;
        writeln!(w, "# max_thickness      {:>10}", cfg.capacity.max_thickness)?;
        writeln!(
            w,
            "# angular_tolerance  {:>10.4} degrees",
            cfg.growth.angular_tolerance_deg
        )?;
        writeln!(
            w,
            "# macular_radius     {:>10.4} mm",
            cfg.capacity.macular_radius_mm
        )?;
        writeln!(w, "# onh_x              {:>10}", geom.onh.x)?;
        writeln!(w, "# onh_y              {:>10}", geom.onh.y)?;
        writeln!(w, "# onh_semi_x         {:>10.1}", geom.onh_semi_x)?;
        writeln!(w, "# onh_semi_y         {:>10.1}", geom.onh_semi_y)?;
        writeln!(w, "# grid               {:>10}", geom.grid_size)?;
        writeln!(w, "# grid_scale         {:>10}", geom.grid_scale)?;
        writeln!(w, "# workers            {:>10}", cfg.runtime.workers)?;
        Ok(())
    }

    pub fn cells(&mut self, n: usize) -> io::Result<()> {
        writeln!(self.out, "# cells {}", n)
    }

    /// Writes one cell's outcome; every `print_route_every`-th cell that
    /// grew also gets its full route.
    pub fn outcome(
        &mut self,
        index: usize,
        cell: &SourceCell,
        outcome: &Outcome,
        grid: &SpatialGrid,
    ) -> io::Result<()> {
        match outcome {
            Outcome::Grown(p) => {
                writeln!(
                    self.out,
                    "{:6} {:6} {:6} {:6} {}",
                    p.start.x, p.start.y, p.end.x, p.end.y, p.hops
                )?;
                if self.route_every.is_some_and(|n| index % n == 0)
                    && let Some(start) = grid.index(p.start)
                {
                    for idx in grid.route(start) {
                        let g = grid.coord(idx);
                        writeln!(self.out, "{:6} {:6}", g.x, g.y)?;
                    }
                    writeln!(self.out, "-1 -1")?;
                }
                Ok(())
            }
            Outcome::Failed(GrowthFailure::NoCompletedNeighbour) => {
                writeln!(self.out, "# Kn {} {}", cell.pos.x, cell.pos.y)
            }
            Outcome::Failed(GrowthFailure::DetourExhausted { .. }) => {
                writeln!(self.out, "# K {} {}", cell.pos.x, cell.pos.y)
            }
            Outcome::Failed(GrowthFailure::OutsideGrid) => {
                writeln!(self.out, "# Ko {} {}", cell.pos.x, cell.pos.y)
            }
        }
    }

    pub fn profile(&mut self, profile: &[(u32, u32)]) -> io::Result<()> {
        for &(deg, count) in profile {
            writeln!(self.out, "# profile {:3} {}", deg, count)?;
        }
        Ok(())
    }

    pub fn summary(&mut self, s: &GrowthSummary) -> io::Result<()> {
        let mean_hops = if s.grown > 0 {
            s.total_hops as f64 / s.grown as f64
        } else {
            0.0
        };
        writeln!(
            self.out,
            "# grown {} direct {} no_neighbour {} detour_exhausted {} outside_grid {} mean_hops {:.2}",
            s.grown, s.direct, s.no_neighbour, s.detour_exhausted, s.outside_grid, mean_hops
        )
    }

    /// Flushes and hands back the writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
