//! Precomputed offsets for nearest-first directional search.

use crate::error::{AxonError, Result};
use glam::IVec2;
use std::f64::consts::{PI, TAU};

/// One search offset, tagged with its bearing from the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanPoint {
    pub offset: IVec2,
    /// `atan2(dy, dx)` in `(-π, π]`.
    pub angle: f64,
}

/// Every integer offset within a radius limit, nearest first.
///
/// Built once per run and shared by every detour search.
#[derive(Clone, Debug)]
pub struct ScanPointTable {
    points: Vec<ScanPoint>,
    radius: u32,
}

impl ScanPointTable {
    /// Enumerates all offsets with `0 < |offset| <= radius`.
    ///
    /// Offsets are ordered by distance from the origin; equal distances keep
    /// their enumeration order, so the table is deterministic. Once sorted,
    /// only the bearing of each offset is kept.
    pub fn new(radius: u32) -> Result<Self> {
        if radius == 0 {
            return Err(AxonError::Setup(
                "scan point radius must be at least 1".to_string(),
            ));
        }
        let r = i32::try_from(radius)
            .map_err(|_| AxonError::Setup(format!("scan point radius {} too large", radius)))?;
        let r2 = i64::from(r) * i64::from(r);

        let mut by_dist: Vec<(IVec2, i64)> = Vec::with_capacity((2 * r as usize + 1).pow(2));
        for dy in -r..=r {
            for dx in -r..=r {
                let d2 = i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy);
                if d2 == 0 || d2 > r2 {
                    continue;
                }
                by_dist.push((IVec2::new(dx, dy), d2));
            }
        }
        by_dist.sort_by_key(|&(_, d2)| d2);

        let points = by_dist
            .into_iter()
            .map(|(offset, _)| ScanPoint {
                offset,
                angle: f64::from(offset.y).atan2(f64::from(offset.x)),
            })
            .collect();

        Ok(Self { points, radius })
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanPoint> {
        self.points.iter()
    }

    /// Offsets whose bearing is within `tolerance` of `bearing`, nearest first.
    pub fn within_cone(&self, bearing: f64, tolerance: f64) -> impl Iterator<Item = &ScanPoint> {
        self.points
            .iter()
            .filter(move |sp| angle_between(sp.angle, bearing) <= tolerance)
    }
}

/// Absolute difference between two angles, wrapped into `[0, π]`.
#[inline]
pub fn angle_between(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(TAU);
    if d > PI { TAU - d } else { d }
}
