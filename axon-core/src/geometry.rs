//! Pixel-space geometry of the simulated retina.
//!
//! [`Geometry`] resolves a [`Config`] into integer pixel coordinates once, and
//! answers every spatial question the other phases ask: where the ONH edge is,
//! which positions are excluded from cell placement, how thick a grid cell may
//! be, and whether a hop between two grid cells crosses the raphe.
//!
//! The fovea sits at the centre of the field. The raphe is the horizontal ray
//! from the fovea pointing away from the ONH.

use crate::config::Config;
use crate::error::{AxonError, Result};
use crate::types::Hemisphere;
use glam::{DVec2, IVec2};
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    /// Side length of the field in pixels.
    pub size: i32,
    /// Side length of a grid cell in pixels.
    pub grid_scale: i32,
    /// Number of grid cells along each side.
    pub grid_size: usize,
    pub pixels_per_mm: f64,
    /// Fovea centre.
    pub center: IVec2,
    /// ONH centre.
    pub onh: IVec2,
    /// Horizontal semi-axis of the ONH ellipse, in pixels.
    pub onh_semi_x: f64,
    /// Vertical semi-axis of the ONH ellipse, in pixels.
    pub onh_semi_y: f64,
    pub fovea_radius: f64,
    pub raphe_half_width: f64,
    pub macular_radius: f64,
    pub max_thickness: u32,
    /// Direct-attach threshold, in pixels from the ONH edge.
    pub direct_attach: f64,
}

impl Geometry {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        cfg.validate()?;

        let ppm = cfg.field.pixels_per_mm;
        let size_px = (cfg.field.size_mm * ppm).round();
        if !(1.0..=f64::from(i32::MAX / 4)).contains(&size_px) {
            return Err(AxonError::Setup(format!(
                "field of {} pixels per side is not representable",
                size_px
            )));
        }
        let size = size_px as i32;
        let grid_scale = i32::try_from(cfg.field.grid_scale)
            .map_err(|_| AxonError::Setup("grid_scale too large".to_string()))?;
        let grid_size = ((size + grid_scale - 1) / grid_scale) as usize;

        let center = IVec2::splat(size / 2);
        let half_axial = cfg.onh.axial_length_mm / 2.0;
        let onh = IVec2::new(
            (f64::from(center.x) + cfg.onh.x_deg.to_radians() * half_axial * ppm) as i32,
            (f64::from(center.y) + cfg.onh.y_deg.to_radians() * half_axial * ppm) as i32,
        );
        if onh.x < 0 || onh.y < 0 || onh.x >= size || onh.y >= size {
            return Err(AxonError::Setup(format!(
                "ONH centre ({}, {}) lies outside the {}x{} field",
                onh.x, onh.y, size, size
            )));
        }

        Ok(Self {
            size,
            grid_scale,
            grid_size,
            pixels_per_mm: ppm,
            center,
            onh,
            onh_semi_x: cfg.onh.width_mm / 2.0 * ppm,
            onh_semi_y: cfg.onh.height_mm / 2.0 * ppm,
            fovea_radius: cfg.field.fovea_radius_mm * ppm,
            raphe_half_width: cfg.field.raphe_half_width_mm * ppm,
            macular_radius: cfg.capacity.macular_radius_mm * ppm,
            max_thickness: cfg.capacity.max_thickness,
            direct_attach: cfg.growth.direct_attach_mm * ppm,
        })
    }

    /// Radius of the ONH ellipse along bearing `theta`.
    #[inline]
    pub fn onh_edge(&self, theta: f64) -> f64 {
        let (a, b) = (self.onh_semi_x, self.onh_semi_y);
        let (bc, as_) = (b * theta.cos(), a * theta.sin());
        a * b / (bc * bc + as_ * as_).sqrt()
    }

    /// Largest difference between two ONH edge radii.
    ///
    /// Bounds how far "distance to edge" can disagree with Euclidean distance.
    pub fn onh_edge_spread(&self) -> f64 {
        (self.onh_semi_x - self.onh_semi_y).abs()
    }

    /// Signed distance from `p` to the ONH edge; negative inside the ellipse.
    pub fn dist_to_onh_edge(&self, p: IVec2) -> f64 {
        let d = (p - self.onh).as_dvec2();
        d.length() - self.onh_edge(d.y.atan2(d.x))
    }

    /// True within one pixel of the ONH ellipse or inside it.
    pub fn inside_onh(&self, p: IVec2) -> bool {
        self.dist_to_onh_edge(p) <= 1.0
    }

    pub fn in_fovea(&self, p: IVec2) -> bool {
        (p - self.center).as_dvec2().length_squared() <= self.fovea_radius * self.fovea_radius
    }

    /// True if a pixel column `x` lies on the raphe's side of the fovea.
    #[inline]
    pub fn on_raphe_side(&self, x: f64) -> bool {
        let cx = f64::from(self.center.x);
        if self.onh.x >= self.center.x {
            x < cx
        } else {
            x > cx
        }
    }

    pub fn in_raphe_band(&self, p: IVec2) -> bool {
        self.on_raphe_side(f64::from(p.x))
            && f64::from((p.y - self.center.y).abs()) < self.raphe_half_width
    }

    /// Positions where no source cell may be placed.
    pub fn is_excluded(&self, p: IVec2) -> bool {
        self.in_fovea(p) || self.in_raphe_band(p) || self.inside_onh(p)
    }

    /// Path capacity of a grid cell whose reference pixel is `p`.
    ///
    /// Zero inside the fovea, then linear in distance from the fovea edge up
    /// to `max_thickness`, scaled by the pixel area of one grid cell.
    pub fn capacity_at(&self, p: IVec2) -> u32 {
        let d2 = (p - self.center).as_dvec2().length_squared();
        if d2 <= self.fovea_radius * self.fovea_radius {
            return 0;
        }
        let per_pixel = ((d2.sqrt() - self.fovea_radius) / self.macular_radius
            * f64::from(self.max_thickness))
        .round()
        .clamp(0.0, f64::from(self.max_thickness)) as u64;
        let area = (self.grid_scale as u64) * (self.grid_scale as u64);
        (per_pixel * area).min(u64::from(u32::MAX - 1)) as u32
    }

    /// Capacity of the grid cell at grid coordinate `g`.
    pub fn grid_capacity(&self, g: IVec2) -> u32 {
        self.capacity_at(g * self.grid_scale)
    }

    /// Grid coordinate of the cell containing pixel `p`.
    #[inline]
    pub fn grid_of(&self, p: IVec2) -> IVec2 {
        IVec2::new(
            p.x.div_euclid(self.grid_scale),
            p.y.div_euclid(self.grid_scale),
        )
    }

    /// Pixel-space centre of grid cell `g`.
    #[inline]
    pub fn cell_centre(&self, g: IVec2) -> DVec2 {
        (g.as_dvec2() + DVec2::splat(0.5)) * f64::from(self.grid_scale)
    }

    /// Position of `p` in mm relative to the fovea.
    pub fn to_mm(&self, p: IVec2) -> DVec2 {
        (p - self.center).as_dvec2() / self.pixels_per_mm
    }

    /// Hemisphere of a pixel, or `None` when it sits exactly on the raphe line.
    pub fn hemisphere_of(&self, p: IVec2) -> Option<Hemisphere> {
        match p.y.cmp(&self.center.y) {
            Ordering::Less => Some(Hemisphere::Superior),
            Ordering::Greater => Some(Hemisphere::Inferior),
            Ordering::Equal => None,
        }
    }

    /// Hemisphere of a grid cell, judged by its centre.
    pub fn grid_hemisphere(&self, g: IVec2) -> Hemisphere {
        if self.cell_centre(g).y < f64::from(self.center.y) {
            Hemisphere::Superior
        } else {
            Hemisphere::Inferior
        }
    }

    /// True if the straight hop between grid cells `a` and `b` crosses the
    /// raphe ray.
    pub fn crosses_raphe(&self, a: IVec2, b: IVec2) -> bool {
        if self.grid_hemisphere(a) == self.grid_hemisphere(b) {
            return false;
        }
        let (ca, cb) = (self.cell_centre(a), self.cell_centre(b));
        let cy = f64::from(self.center.y);
        let t = (cy - ca.y) / (cb.y - ca.y);
        self.on_raphe_side(ca.x + t * (cb.x - ca.x))
    }

    /// True if grid cell `g` lies on the raphe side of the fovea but in the
    /// hemisphere opposite `committed`.
    pub fn off_hemisphere(&self, g: IVec2, committed: Hemisphere) -> bool {
        self.on_raphe_side(self.cell_centre(g).x) && self.grid_hemisphere(g) != committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::small_config;
    use std::f64::consts::FRAC_PI_2;

    fn geom() -> Geometry {
        Geometry::from_config(&small_config()).unwrap()
    }

    #[test]
    fn default_config_reproduces_reference_layout() {
        let g = Geometry::from_config(&Config::default()).unwrap();
        assert_eq!(g.size, 20_000);
        assert_eq!(g.grid_size, 100);
        assert_eq!(g.center, IVec2::new(10_000, 10_000));
        assert_eq!(g.onh, IVec2::new(13_272, 10_436));
        assert!((g.onh_semi_x - 830.0).abs() < 1e-6);
        assert!((g.onh_semi_y - 970.0).abs() < 1e-6);
    }

    #[test]
    fn small_config_layout() {
        let g = geom();
        assert_eq!(g.size, 400);
        assert_eq!(g.grid_size, 40);
        assert_eq!(g.onh, IVec2::new(291, 212));
    }

    #[test]
    fn onh_edge_matches_semi_axes() {
        let g = geom();
        assert!((g.onh_edge(0.0) - g.onh_semi_x).abs() < 1e-9);
        assert!((g.onh_edge(FRAC_PI_2) - g.onh_semi_y).abs() < 1e-9);
        assert!((g.onh_edge(std::f64::consts::PI) - g.onh_semi_x).abs() < 1e-9);
    }

    #[test]
    fn dist_to_onh_edge_is_signed() {
        let g = geom();
        assert!(g.dist_to_onh_edge(g.onh) < 0.0);
        let p = g.onh + IVec2::new(25, 0);
        assert!((g.dist_to_onh_edge(p) - 5.0).abs() < 1e-9);
        assert!(!g.inside_onh(p));
        assert!(g.inside_onh(g.onh + IVec2::new(20, 0)));
    }

    #[test]
    fn exclusion_zones() {
        let g = geom();
        assert!(g.is_excluded(g.center));
        assert!(g.is_excluded(g.onh));
        // Raphe band runs away from the ONH only.
        assert!(g.in_raphe_band(IVec2::new(50, 202)));
        assert!(!g.in_raphe_band(IVec2::new(350, 202)));
        assert!(!g.in_raphe_band(IVec2::new(50, 230)));
        assert!(!g.is_excluded(IVec2::new(50, 50)));
    }

    #[test]
    fn capacity_is_zero_in_fovea_and_capped() {
        let g = geom();
        assert_eq!(g.capacity_at(g.center), 0);
        assert_eq!(g.capacity_at(g.center + IVec2::new(5, 5)), 0);
        // 110 px out: (110 - 10) / 100 * 3 = 3 = max.
        assert_eq!(g.capacity_at(g.center + IVec2::new(110, 0)), 300);
        assert_eq!(g.capacity_at(IVec2::new(0, 0)), 300);
        // 70 px out: round(60 / 100 * 3) = 2.
        assert_eq!(g.capacity_at(g.center + IVec2::new(70, 0)), 200);
    }

    #[test]
    fn hemispheres() {
        let g = geom();
        assert_eq!(g.hemisphere_of(IVec2::new(10, 150)), Some(Hemisphere::Superior));
        assert_eq!(g.hemisphere_of(IVec2::new(10, 250)), Some(Hemisphere::Inferior));
        assert_eq!(g.hemisphere_of(IVec2::new(10, 200)), None);
        assert_eq!(g.grid_hemisphere(IVec2::new(3, 19)), Hemisphere::Superior);
        assert_eq!(g.grid_hemisphere(IVec2::new(3, 20)), Hemisphere::Inferior);
    }

    #[test]
    fn raphe_crossing_only_on_raphe_side() {
        let g = geom();
        assert!(g.crosses_raphe(IVec2::new(5, 18), IVec2::new(5, 22)));
        assert!(g.crosses_raphe(IVec2::new(5, 22), IVec2::new(6, 19)));
        // Same hemisphere.
        assert!(!g.crosses_raphe(IVec2::new(5, 10), IVec2::new(8, 19)));
        // Crossing happens nasal of the fovea.
        assert!(!g.crosses_raphe(IVec2::new(30, 18), IVec2::new(30, 22)));
        // Diagonal hop whose crossing point lands nasal of the fovea.
        assert!(!g.crosses_raphe(IVec2::new(18, 19), IVec2::new(22, 20)));
    }

    #[test]
    fn off_hemisphere_applies_on_raphe_side_only() {
        let g = geom();
        assert!(g.off_hemisphere(IVec2::new(5, 25), Hemisphere::Superior));
        assert!(!g.off_hemisphere(IVec2::new(5, 15), Hemisphere::Superior));
        assert!(!g.off_hemisphere(IVec2::new(30, 25), Hemisphere::Superior));
    }

    #[test]
    fn onh_outside_field_is_a_setup_error() {
        let mut cfg = small_config();
        cfg.onh.x_deg = 90.0;
        assert!(matches!(
            Geometry::from_config(&cfg),
            Err(AxonError::Setup(_))
        ));
    }
}
