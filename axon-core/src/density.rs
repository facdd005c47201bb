//! Ganglion cell density lookup used to place source cells.

use crate::config::DensityConfig;
use crate::error::Result;

/// Cell density in cells/mm² at a position given in mm from the fovea.
pub trait DensityMap: Sync {
    fn density(&self, x_mm: f64, y_mm: f64) -> f64;
}

impl<F> DensityMap for F
where
    F: Fn(f64, f64) -> f64 + Sync,
{
    fn density(&self, x_mm: f64, y_mm: f64) -> f64 {
        self(x_mm, y_mm)
    }
}

/// Piecewise-linear density along four meridians, blended by angle.
///
/// At bearing `θ` and eccentricity `r` the density is
/// `h(r)·cos²θ + v(r)·sin²θ`, where `h` is the nasal or temporal meridian
/// and `v` the superior or inferior one, depending on the quadrant.
#[derive(Clone, Debug)]
pub struct TabulatedDensity {
    table: DensityConfig,
}

impl TabulatedDensity {
    pub fn new(table: DensityConfig) -> Result<Self> {
        table.validate()?;
        Ok(Self { table })
    }
}

impl DensityMap for TabulatedDensity {
    fn density(&self, x_mm: f64, y_mm: f64) -> f64 {
        let t = &self.table;
        let r = x_mm.hypot(y_mm);
        let xs = &t.eccentricity_mm;

        let h = interp_axis(xs, if x_mm >= 0.0 { &t.nasal } else { &t.temporal }, r);
        let v = interp_axis(xs, if y_mm < 0.0 { &t.superior } else { &t.inferior }, r);
        if r == 0.0 {
            return h;
        }
        let (cos2, sin2) = ((x_mm / r).powi(2), (y_mm / r).powi(2));
        h * cos2 + v * sin2
    }
}

/// Linear interpolation of `ys` over ascending `xs`, clamped at both ends.
pub fn interp_axis(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = xs[..n].partition_point(|&v| v <= x);
    let (x1, x2, y1, y2) = (xs[i - 1], xs[i], ys[i - 1], ys[i]);
    y1 + (y2 - y1) * (x - x1) / (x2 - x1)
}
