//! Placement of source cells across the field.
//!
//! Every admissible pixel hosts a cell with the probability the density map
//! gives for it. Bands of rows are sampled in parallel, each with its own
//! seeded RNG, and the merged field is sorted by distance to the ONH edge.

use crate::config::SamplingConfig;
use crate::density::DensityMap;
use crate::geometry::Geometry;
use crate::partition::Partitioner;
use glam::IVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use tracing::info;

/// A ganglion cell body whose axon must be routed to the ONH.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceCell {
    pub pos: IVec2,
    /// Distance from `pos` to the ONH ellipse edge, in pixels.
    pub dist_to_onh_edge: f64,
}

/// Source cells in ascending order of distance to the ONH edge.
///
/// Growth relies on this order: a cell may only attach to cells that come
/// before it.
#[derive(Clone, Debug, Default)]
pub struct CellField {
    pub cells: Vec<SourceCell>,
}

impl CellField {
    pub fn from_positions(geom: &Geometry, positions: impl IntoIterator<Item = IVec2>) -> Self {
        let cells = positions
            .into_iter()
            .map(|pos| SourceCell {
                pos,
                dist_to_onh_edge: geom.dist_to_onh_edge(pos),
            })
            .collect();

        Self::sorted(cells)
    }

    /// Places cells by a Bernoulli trial at every admissible pixel.
    ///
    /// The acceptance probability at a pixel is the density there, converted
    /// to cells per pixel and scaled by `density_multiplier`. Each row band is
    /// sampled by its own worker with a generator seeded from `seed` and the
    /// band index, so a run is reproducible for a fixed worker count.
    pub fn sample<D>(
        geom: &Geometry,
        density: &D,
        sampling: &SamplingConfig,
        partitioner: &Partitioner,
    ) -> Self
    where
        D: DensityMap + ?Sized,
    {
        info!(workers = partitioner.workers(), "Making cells");
        let rows = geom.size as usize;
        let bands = partitioner.map_bands(rows, |band, rows| {
            sample_band(geom, density, sampling, band, rows)
        });

        let field = Self::sorted(bands.into_iter().flatten().collect());
        info!(cells = field.len(), "Cell field ready");
        field
    }

    fn sorted(mut cells: Vec<SourceCell>) -> Self {
        cells.sort_by(|a, b| a.dist_to_onh_edge.total_cmp(&b.dist_to_onh_edge));
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceCell> {
        self.cells.iter()
    }
}

fn sample_band<D>(
    geom: &Geometry,
    density: &D,
    sampling: &SamplingConfig,
    band: usize,
    rows: Range<usize>,
) -> Vec<SourceCell>
where
    D: DensityMap + ?Sized,
{
    let mut rng = StdRng::seed_from_u64(sampling.seed.wrapping_add(band as u64));
    let per_pixel = sampling.density_multiplier / (geom.pixels_per_mm * geom.pixels_per_mm);
    let mut out = Vec::new();

    for y in rows {
        for x in 0..geom.size {
            let pos = IVec2::new(x, y as i32);
            if geom.is_excluded(pos) {
                continue;
            }
            let mm = geom.to_mm(pos);
            let prob = density.density(mm.x, mm.y) * per_pixel;
            if rng.random::<f64>() < prob {
                out.push(SourceCell {
                    pos,
                    dist_to_onh_edge: geom.dist_to_onh_edge(pos),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::small_config;

    fn geom() -> Geometry {
        Geometry::from_config(&small_config()).unwrap()
    }

    #[test]
    fn from_positions_sorts_by_distance_to_onh_edge() {
        let g = geom();
        let field = CellField::from_positions(
            &g,
            vec![
                IVec2::new(10, 10),
                g.onh + IVec2::new(30, 0),
                IVec2::new(150, 300),
            ],
        );

        assert_eq!(field.len(), 3);
        assert_eq!(field.cells[0].pos, g.onh + IVec2::new(30, 0));
        assert!((field.cells[0].dist_to_onh_edge - 10.0).abs() < 1e-9);
        assert!(
            field
                .cells
                .windows(2)
                .all(|w| w[0].dist_to_onh_edge <= w[1].dist_to_onh_edge)
        );
    }

    #[test]
    fn zero_density_places_no_cells() {
        let g = geom();
        let part = Partitioner::new(2).unwrap();
        let field = CellField::sample(&g, &|_: f64, _: f64| 0.0, &SamplingConfig::default(), &part);
        assert!(field.is_empty());
    }

    #[test]
    fn certain_density_fills_every_admissible_pixel() {
        let g = geom();
        let part = Partitioner::new(3).unwrap();
        let sampling = SamplingConfig {
            density_multiplier: 1.0,
            seed: 7,
        };
        // 10_000 cells/mm² is one cell per pixel at 100 px/mm.
        let field = CellField::sample(&g, &|_: f64, _: f64| 10_000.0, &sampling, &part);

        let admissible = (0..g.size)
            .flat_map(|y| (0..g.size).map(move |x| IVec2::new(x, y)))
            .filter(|&p| !g.is_excluded(p))
            .count();
        assert_eq!(field.len(), admissible);
        assert!(field.iter().all(|c| !g.is_excluded(c.pos)));
    }

    #[test]
    fn sampling_is_reproducible_and_sorted() {
        let g = geom();
        let part = Partitioner::new(4).unwrap();
        let sampling = SamplingConfig {
            density_multiplier: 1.0,
            seed: 42,
        };
        let density = |_: f64, _: f64| 500.0;

        let a = CellField::sample(&g, &density, &sampling, &part);
        let b = CellField::sample(&g, &density, &sampling, &part);
        assert!(!a.is_empty());
        assert_eq!(a.cells, b.cells);
        assert!(
            a.cells
                .windows(2)
                .all(|w| w[0].dist_to_onh_edge <= w[1].dist_to_onh_edge)
        );

        // Roughly 5% of the admissible pixels.
        let expected = 0.05 * f64::from(g.size * g.size);
        let n = a.len() as f64;
        assert!(n > expected * 0.8 && n < expected * 1.1, "got {} cells", n);
    }
}
