//! Run configuration.
//!
//! Every tunable of a simulation run lives here, grouped into sections that
//! mirror the TOML layout. All sections are optional in a config file; missing
//! sections and fields fall back to the defaults, which model a 20 mm square of
//! human retina sampled at 1 µm.

use crate::error::{AxonError, Result};
use crate::types::Hemisphere;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub field: FieldConfig,
    pub onh: OnhConfig,
    pub capacity: CapacityConfig,
    pub sampling: SamplingConfig,
    pub growth: GrowthConfig,
    pub runtime: RuntimeConfig,
    pub density: DensityConfig,
    pub output: OutputConfig,
}

/// Extent and resolution of the simulated field.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Side length of the square field in mm. The fovea sits at its centre.
    pub size_mm: f64,
    /// Fine-grained pixels per mm.
    pub pixels_per_mm: f64,
    /// Side length of one grid cell in pixels.
    pub grid_scale: u32,
    pub fovea_radius_mm: f64,
    /// Half height of the band around the raphe line where no cells are placed.
    pub raphe_half_width_mm: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            size_mm: 20.0,
            pixels_per_mm: 1000.0,
            grid_scale: 200,
            fovea_radius_mm: 0.2,
            raphe_half_width_mm: 0.1,
        }
    }
}

/// Optic nerve head placement and shape.
///
/// The position is given in degrees of visual angle from the fovea and
/// converted to mm on a sphere of the given axial length.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OnhConfig {
    pub x_deg: f64,
    pub y_deg: f64,
    pub axial_length_mm: f64,
    /// Full horizontal extent of the ellipse.
    pub width_mm: f64,
    /// Full vertical extent of the ellipse.
    pub height_mm: f64,
}

impl Default for OnhConfig {
    fn default() -> Self {
        Self {
            x_deg: 15.0,
            y_deg: 2.0,
            axial_length_mm: 25.0,
            width_mm: 1.66,
            height_mm: 1.94,
        }
    }
}

/// Nerve-fibre-bundle thickness model.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Distance from the fovea edge at which thickness reaches its maximum.
    pub macular_radius_mm: f64,
    /// Maximum paths per pixel; multiplied by the pixel area of a grid cell.
    pub max_thickness: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            macular_radius_mm: 3.0,
            max_thickness: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Multiplier applied to the density lookup before the per-pixel trial.
    pub density_multiplier: f64,
    /// Base seed; each band derives its own generator from it.
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            density_multiplier: 1.2,
            seed: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GrowthConfig {
    /// Radius limit of the detour search, in grid cells.
    pub scan_radius: u32,
    /// Half-width of the detour search cone around the desired bearing.
    pub angular_tolerance_deg: f64,
    /// Cells closer than this to the ONH edge attach to it directly.
    pub direct_attach_mm: f64,
    /// Hemisphere used for cells that sit exactly on the raphe line.
    pub raphe_tie_break: Hemisphere,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            scan_radius: 40,
            angular_tolerance_deg: 60.0,
            direct_attach_mm: 0.2,
            raphe_tie_break: Hemisphere::Superior,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads used for grid initialisation and sampling.
    pub workers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Tabulated ganglion cell density (cells/mm²) along the four meridians.
///
/// All tables are sampled at the same eccentricities. Nasal points toward the
/// ONH (+x); superior is -y.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DensityConfig {
    pub eccentricity_mm: Vec<f64>,
    pub temporal: Vec<f64>,
    pub nasal: Vec<f64>,
    pub superior: Vec<f64>,
    pub inferior: Vec<f64>,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            eccentricity_mm: vec![
                0.0, 0.2, 0.4, 0.6, 0.8, 1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 12.0,
                14.0,
            ],
            temporal: vec![
                0.0, 18000.0, 32000.0, 34000.0, 31000.0, 27000.0, 19000.0, 13000.0, 9500.0,
                7000.0, 4200.0, 2700.0, 1800.0, 900.0, 500.0, 300.0, 200.0,
            ],
            nasal: vec![
                0.0, 18000.0, 33000.0, 36000.0, 33000.0, 29000.0, 21000.0, 15000.0, 11000.0,
                8500.0, 5500.0, 3800.0, 2600.0, 1400.0, 800.0, 500.0, 350.0,
            ],
            superior: vec![
                0.0, 17000.0, 30000.0, 32000.0, 29000.0, 25000.0, 17500.0, 12000.0, 8800.0,
                6500.0, 4000.0, 2600.0, 1700.0, 850.0, 450.0, 280.0, 180.0,
            ],
            inferior: vec![
                0.0, 17000.0, 30000.0, 32500.0, 29500.0, 25500.0, 18000.0, 12500.0, 9200.0,
                6800.0, 4100.0, 2700.0, 1750.0, 880.0, 470.0, 290.0, 190.0,
            ],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print the full route of every Nth grown path.
    pub print_route_every: Option<usize>,
    /// Emit a per-degree fibre-count profile on a circle of this radius
    /// around the ONH.
    pub profile_radius_mm: Option<f64>,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AxonError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        let f = &self.field;
        positive("field.size_mm", f.size_mm)?;
        positive("field.pixels_per_mm", f.pixels_per_mm)?;
        if f.grid_scale == 0 {
            return Err(invalid("field.grid_scale must be at least 1"));
        }
        non_negative("field.fovea_radius_mm", f.fovea_radius_mm)?;
        non_negative("field.raphe_half_width_mm", f.raphe_half_width_mm)?;

        positive("onh.axial_length_mm", self.onh.axial_length_mm)?;
        positive("onh.width_mm", self.onh.width_mm)?;
        positive("onh.height_mm", self.onh.height_mm)?;

        positive("capacity.macular_radius_mm", self.capacity.macular_radius_mm)?;
        non_negative(
            "sampling.density_multiplier",
            self.sampling.density_multiplier,
        )?;

        let g = &self.growth;
        if g.scan_radius == 0 {
            return Err(invalid("growth.scan_radius must be at least 1"));
        }
        if !(g.angular_tolerance_deg > 0.0 && g.angular_tolerance_deg <= 180.0) {
            return Err(invalid(
                "growth.angular_tolerance_deg must be in (0, 180]",
            ));
        }
        non_negative("growth.direct_attach_mm", g.direct_attach_mm)?;

        if self.runtime.workers == 0 {
            return Err(invalid("runtime.workers must be at least 1"));
        }
        if self.output.print_route_every == Some(0) {
            return Err(invalid("output.print_route_every must be at least 1"));
        }
        if let Some(r) = self.output.profile_radius_mm {
            positive("output.profile_radius_mm", r)?;
        }

        self.density.validate()
    }
}

impl DensityConfig {
    pub fn validate(&self) -> Result<()> {
        let n = self.eccentricity_mm.len();
        if n < 2 {
            return Err(invalid("density.eccentricity_mm needs at least 2 samples"));
        }
        if self.eccentricity_mm.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid(
                "density.eccentricity_mm must be strictly increasing",
            ));
        }
        for (name, table) in [
            ("temporal", &self.temporal),
            ("nasal", &self.nasal),
            ("superior", &self.superior),
            ("inferior", &self.inferior),
        ] {
            if table.len() != n {
                return Err(AxonError::Config(format!(
                    "density.{} has {} samples, expected {}",
                    name,
                    table.len(),
                    n
                )));
            }
            if table.iter().any(|v| !(*v >= 0.0)) {
                return Err(AxonError::Config(format!(
                    "density.{} contains negative or NaN values",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> AxonError {
    AxonError::Config(msg.to_string())
}

fn positive(name: &str, v: f64) -> Result<()> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(AxonError::Config(format!("{} must be positive, got {}", name, v)))
    }
}

fn non_negative(name: &str, v: f64) -> Result<()> {
    if v >= 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(AxonError::Config(format!(
            "{} must be non-negative, got {}",
            name, v
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg = Config::from_toml(
            r#"
            [growth]
            scan_radius = 12
            raphe_tie_break = "inferior"

            [runtime]
            workers = 2
            "#,
        )
        .unwrap();

        assert_eq!(cfg.growth.scan_radius, 12);
        assert_eq!(cfg.growth.raphe_tie_break, Hemisphere::Inferior);
        assert_eq!(cfg.growth.angular_tolerance_deg, 60.0);
        assert_eq!(cfg.runtime.workers, 2);
        assert_eq!(cfg.field, FieldConfig::default());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let cfg = Config::from_toml(include_str!("../../configs/default.toml")).unwrap();
        let expected = Config {
            output: OutputConfig {
                profile_radius_mm: Some(1.7),
                ..OutputConfig::default()
            },
            ..Config::default()
        };
        assert_eq!(cfg, expected);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = Config::from_toml("[runtime]\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, AxonError::Config(_)));
    }

    #[test]
    fn zero_scan_radius_is_rejected() {
        let mut cfg = Config::default();
        cfg.growth.scan_radius = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn mismatched_density_tables_are_rejected() {
        let mut cfg = Config::default();
        cfg.density.nasal.pop();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.density.eccentricity_mm.swap(1, 2);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml("[field\nsize_mm = 3").unwrap_err();
        assert!(matches!(err, AxonError::Toml(_)));
    }
}
