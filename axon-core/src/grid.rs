//! Capacity grid that axon paths are routed through.
//!
//! A grid cell aggregates `grid_scale²` fine-grained pixels. Each cell knows
//! how many paths pass through it, how many it may carry, and the next cell
//! on the most recent route through it toward the ONH. Paths are never stored
//! directly; [`SpatialGrid::route`] rebuilds one by following those memos.

use crate::error::{AxonError, Result};
use crate::geometry::Geometry;
use crate::partition::Partitioner;
use crate::types::GridIdx;
use glam::IVec2;
use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridCell {
    /// Paths currently routed through this cell.
    pub count: u32,
    /// Paths this cell may carry. `u32::MAX` marks the sink.
    pub thickness: u32,
    /// Set while the cell is part of the path under construction.
    pub flag: bool,
    /// Next cell toward the ONH on the last route through this cell.
    pub next_hop: Option<GridIdx>,
}

/// Row-major arena of [`GridCell`]s with a single unbounded sink.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    width: usize,
    height: usize,
    cells: Vec<GridCell>,
    sink: GridIdx,
}

impl SpatialGrid {
    /// Builds the grid for `geom`, filling capacities band by band.
    pub fn new(geom: &Geometry, partitioner: &Partitioner) -> Result<Self> {
        info!(
            size = geom.grid_size,
            workers = partitioner.workers(),
            "Initialising grid"
        );
        let sink = geom.grid_of(geom.onh);
        Self::from_capacity(geom.grid_size, geom.grid_size, sink, partitioner, |g| {
            geom.grid_capacity(g)
        })
    }

    /// Builds a grid whose cell at `g` has capacity `capacity(g)`.
    ///
    /// The cell at `sink` is made unbounded regardless of `capacity`.
    pub fn from_capacity<F>(
        width: usize,
        height: usize,
        sink: IVec2,
        partitioner: &Partitioner,
        capacity: F,
    ) -> Result<Self>
    where
        F: Fn(IVec2) -> u32 + Sync,
    {
        if width == 0 || height == 0 {
            return Err(AxonError::Setup(format!(
                "grid of {}x{} cells is empty",
                width, height
            )));
        }
        if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
            return Err(AxonError::Setup(format!(
                "grid of {}x{} cells is too large",
                width, height
            )));
        }
        let len = width.checked_mul(height).ok_or_else(|| {
            AxonError::Setup(format!("grid of {}x{} cells is too large", width, height))
        })?;

        let mut cells = vec![GridCell::default(); len];
        partitioner.for_each_row(&mut cells, width, |y, row| {
            for (x, cell) in row.iter_mut().enumerate() {
                cell.thickness = capacity(IVec2::new(x as i32, y as i32));
            }
        });

        let mut grid = Self {
            width,
            height,
            cells,
            sink: 0,
        };
        grid.sink = grid.index(sink).ok_or_else(|| {
            AxonError::Setup(format!(
                "ONH grid cell ({}, {}) lies outside the {}x{} grid",
                sink.x, sink.y, width, height
            ))
        })?;
        grid.cells[grid.sink].thickness = u32::MAX;
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn sink(&self) -> GridIdx {
        self.sink
    }

    #[inline]
    pub fn is_sink(&self, idx: GridIdx) -> bool {
        idx == self.sink
    }

    /// Index of the cell at grid coordinate `g`, if it lies inside the grid.
    #[inline]
    pub fn index(&self, g: IVec2) -> Option<GridIdx> {
        let x = usize::try_from(g.x).ok()?;
        let y = usize::try_from(g.y).ok()?;
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    #[inline]
    pub fn coord(&self, idx: GridIdx) -> IVec2 {
        IVec2::new((idx % self.width) as i32, (idx / self.width) as i32)
    }

    #[inline]
    pub fn cell(&self, idx: GridIdx) -> &GridCell {
        &self.cells[idx]
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// True if one more path fits through `idx`. Always true for the sink.
    #[inline]
    pub fn has_room(&self, idx: GridIdx) -> bool {
        let c = &self.cells[idx];
        self.is_sink(idx) || c.count < c.thickness
    }

    /// Records one more path through `idx`.
    #[inline]
    pub fn consume(&mut self, idx: GridIdx) {
        let c = &mut self.cells[idx];
        c.count = c.count.saturating_add(1);
    }

    /// Records one more path through `idx` only if it has room.
    pub fn try_consume(&mut self, idx: GridIdx) -> bool {
        if self.has_room(idx) {
            self.consume(idx);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn is_flagged(&self, idx: GridIdx) -> bool {
        self.cells[idx].flag
    }

    #[inline]
    pub fn set_flag(&mut self, idx: GridIdx) {
        self.cells[idx].flag = true;
    }

    #[inline]
    pub fn clear_flag(&mut self, idx: GridIdx) {
        self.cells[idx].flag = false;
    }

    #[inline]
    pub fn next_hop(&self, idx: GridIdx) -> Option<GridIdx> {
        self.cells[idx].next_hop
    }

    #[inline]
    pub fn set_next_hop(&mut self, idx: GridIdx, next: Option<GridIdx>) {
        self.cells[idx].next_hop = next;
    }

    /// Follows routing memos from `start`, yielding `start` first and ending
    /// at the sink or at the first cell without a memo.
    ///
    /// Bounded by the number of cells, so a memo cycle cannot hang it.
    pub fn route(&self, start: GridIdx) -> Route<'_> {
        Route {
            grid: self,
            next: Some(start),
            remaining: self.cells.len(),
        }
    }

    /// True if the memos from `start` lead all the way to the sink.
    pub fn reaches_sink(&self, start: GridIdx) -> bool {
        self.route(start).last() == Some(self.sink)
    }

    /// Cells, other than the sink, carrying more paths than their capacity.
    pub fn over_capacity(&self) -> Vec<GridIdx> {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(i, c)| i != self.sink && c.count > c.thickness)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of cells whose transient flag is set.
    pub fn flagged_count(&self) -> usize {
        self.cells.iter().filter(|c| c.flag).count()
    }
}

/// Iterator over the cells of a memoised route. See [`SpatialGrid::route`].
pub struct Route<'a> {
    grid: &'a SpatialGrid,
    next: Option<GridIdx>,
    remaining: usize,
}

impl Iterator for Route<'_> {
    type Item = GridIdx;

    fn next(&mut self) -> Option<GridIdx> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.next?;
        self.remaining -= 1;
        self.next = if self.grid.is_sink(idx) {
            None
        } else {
            self.grid.next_hop(idx)
        };
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::small_config;

    fn uniform(width: usize, height: usize, sink: IVec2, cap: u32) -> SpatialGrid {
        let part = Partitioner::new(2).unwrap();
        SpatialGrid::from_capacity(width, height, sink, &part, |_| cap).unwrap()
    }

    #[test]
    fn grid_from_geometry_matches_capacity_formula() {
        let geom = Geometry::from_config(&small_config()).unwrap();
        let part = Partitioner::new(3).unwrap();
        let grid = SpatialGrid::new(&geom, &part).unwrap();

        assert_eq!(grid.width(), 40);
        assert_eq!(grid.height(), 40);
        assert_eq!(grid.coord(grid.sink()), IVec2::new(29, 21));
        assert_eq!(grid.cell(grid.sink()).thickness, u32::MAX);

        for idx in 0..grid.len() {
            if grid.is_sink(idx) {
                continue;
            }
            let cell = grid.cell(idx);
            assert_eq!(cell.thickness, geom.grid_capacity(grid.coord(idx)));
            assert_eq!(cell.count, 0);
            assert!(!cell.flag);
            assert_eq!(cell.next_hop, None);
        }

        // The fovea cell has no capacity.
        let fovea = grid.index(IVec2::new(20, 20)).unwrap();
        assert_eq!(grid.cell(fovea).thickness, 0);
    }

    #[test]
    fn band_count_does_not_change_the_grid() {
        let geom = Geometry::from_config(&small_config()).unwrap();
        let one = SpatialGrid::new(&geom, &Partitioner::new(1).unwrap()).unwrap();
        let many = SpatialGrid::new(&geom, &Partitioner::new(7).unwrap()).unwrap();
        assert_eq!(one.cells(), many.cells());
    }

    #[test]
    fn index_rejects_out_of_bounds() {
        let grid = uniform(4, 3, IVec2::new(0, 0), 1);
        assert_eq!(grid.index(IVec2::new(3, 2)), Some(11));
        assert_eq!(grid.coord(11), IVec2::new(3, 2));
        assert_eq!(grid.index(IVec2::new(4, 0)), None);
        assert_eq!(grid.index(IVec2::new(0, 3)), None);
        assert_eq!(grid.index(IVec2::new(-1, 0)), None);
    }

    #[test]
    fn empty_grid_or_outside_sink_is_a_setup_error() {
        let part = Partitioner::new(1).unwrap();
        assert!(SpatialGrid::from_capacity(0, 5, IVec2::ZERO, &part, |_| 1).is_err());
        assert!(SpatialGrid::from_capacity(5, 5, IVec2::new(5, 0), &part, |_| 1).is_err());
    }

    #[test]
    fn capacity_and_consumption() {
        let mut grid = uniform(3, 1, IVec2::new(2, 0), 1);
        assert!(grid.has_room(0));
        assert!(grid.try_consume(0));
        assert!(!grid.has_room(0));
        assert!(!grid.try_consume(0));
        assert_eq!(grid.cell(0).count, 1);

        // The sink never fills up.
        for _ in 0..10 {
            grid.consume(2);
        }
        assert!(grid.has_room(2));
        assert!(grid.over_capacity().is_empty());
    }

    #[test]
    fn zero_capacity_cells_have_no_room() {
        let grid = uniform(3, 3, IVec2::new(1, 1), 0);
        assert!(!grid.has_room(0));
        assert!(grid.has_room(grid.sink()));
    }

    #[test]
    fn route_follows_memos_to_the_sink() {
        let mut grid = uniform(4, 1, IVec2::new(3, 0), 5);
        grid.set_next_hop(0, Some(1));
        grid.set_next_hop(1, Some(2));
        grid.set_next_hop(2, Some(3));
        // A stale memo on the sink must not extend the route.
        grid.set_next_hop(3, Some(0));

        assert_eq!(grid.route(0).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(grid.reaches_sink(0));
        assert!(grid.reaches_sink(2));
    }

    #[test]
    fn route_stops_at_missing_memo_and_on_cycles() {
        let mut grid = uniform(4, 1, IVec2::new(3, 0), 5);
        grid.set_next_hop(0, Some(1));
        assert_eq!(grid.route(0).collect::<Vec<_>>(), vec![0, 1]);
        assert!(!grid.reaches_sink(0));

        grid.set_next_hop(1, Some(0));
        assert_eq!(grid.route(0).count(), grid.len());
        assert!(!grid.reaches_sink(0));
    }

    #[test]
    fn flags_are_tracked() {
        let mut grid = uniform(2, 2, IVec2::new(0, 0), 1);
        grid.set_flag(3);
        assert!(grid.is_flagged(3));
        assert_eq!(grid.flagged_count(), 1);
        grid.clear_flag(3);
        assert_eq!(grid.flagged_count(), 0);
    }
}
