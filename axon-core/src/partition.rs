//! Row-band partitioning for the embarrassingly parallel setup phases.
//!
//! Grid initialisation and source-cell sampling both split the field into
//! disjoint horizontal bands. Each band is handled by exactly one worker and
//! never touches another band's rows, so no locking is needed; the only
//! synchronisation is the join at the end of [`rayon::ThreadPool::install`].

use crate::error::{AxonError, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;

/// Splits `rows` into `parts` contiguous, disjoint ranges covering `0..rows`.
///
/// Bands differ in length by at most one row. When there are more parts than
/// rows some bands are empty.
pub fn row_bands(rows: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    (0..parts)
        .map(|i| (i * rows / parts)..((i + 1) * rows / parts))
        .collect()
}

/// A fixed-size worker pool that runs one job per row band.
pub struct Partitioner {
    pool: ThreadPool,
    workers: usize,
}

impl Partitioner {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(AxonError::Setup("at least one worker is required".to_string()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("axon-band-{}", i))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn bands(&self, rows: usize) -> Vec<Range<usize>> {
        row_bands(rows, self.workers)
    }

    /// Calls `f(row, cells)` for every row of a row-major buffer of the given
    /// width, one band per worker.
    ///
    /// Returns once every band has finished.
    pub fn for_each_row<T, F>(&self, data: &mut [T], width: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        if width == 0 {
            return;
        }
        let rows = data.len() / width;

        let mut pieces = Vec::with_capacity(self.workers);
        let mut rest = data;
        for band in self.bands(rows) {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(band.len() * width);
            pieces.push((band, head));
            rest = tail;
        }

        self.pool.install(|| {
            pieces.into_par_iter().for_each(|(band, chunk)| {
                for (row, cells) in band.zip(chunk.chunks_mut(width)) {
                    f(row, cells);
                }
            });
        });
    }

    /// Runs `f(band_index, rows)` once per band and returns the results in
    /// band order.
    pub fn map_bands<R, F>(&self, rows: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, Range<usize>) -> R + Sync,
    {
        let bands = self.bands(rows);
        self.pool.install(|| {
            bands
                .into_par_iter()
                .enumerate()
                .map(|(i, band)| f(i, band))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_cover_rows_without_overlap() {
        let bands = row_bands(10, 3);
        assert_eq!(bands, vec![0..3, 3..6, 6..10]);

        let bands = row_bands(100, 7);
        assert_eq!(bands.first().unwrap().start, 0);
        assert_eq!(bands.last().unwrap().end, 100);
        for w in bands.windows(2) {
            assert_eq!(w[0].end, w[1].start);
        }
    }

    #[test]
    fn more_parts_than_rows_leaves_empty_bands() {
        let bands = row_bands(2, 4);
        assert_eq!(bands.len(), 4);
        assert_eq!(bands.iter().map(|b| b.len()).sum::<usize>(), 2);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(Partitioner::new(0).is_err());
    }

    #[test]
    fn for_each_row_visits_every_row_once() {
        let part = Partitioner::new(3).unwrap();
        let width = 5;
        let mut data = vec![0usize; width * 11];

        part.for_each_row(&mut data, width, |row, cells| {
            for (x, c) in cells.iter_mut().enumerate() {
                *c += row * 100 + x + 1;
            }
        });

        for (i, v) in data.iter().enumerate() {
            assert_eq!(*v, (i / width) * 100 + i % width + 1);
        }
    }

    #[test]
    fn map_bands_preserves_band_order() {
        let part = Partitioner::new(4).unwrap();
        let out = part.map_bands(20, |i, rows| (i, rows.start, rows.end));
        assert_eq!(out, vec![(0, 0, 5), (1, 5, 10), (2, 10, 15), (3, 15, 20)]);
    }
}
