use crate::config::Config;

/// A 4 mm field at 100 px/mm: 400 px square, 40x40 grid of 10 px cells.
///
/// The fovea is at (200, 200) with a 10 px radius. The ONH is centred at
/// (291, 212) with semi-axes of 20 px horizontally and 25 px vertically.
pub(crate) fn small_config() -> Config {
    let mut cfg = Config::default();
    cfg.field.size_mm = 4.0;
    cfg.field.pixels_per_mm = 100.0;
    cfg.field.grid_scale = 10;
    cfg.field.fovea_radius_mm = 0.1;
    cfg.field.raphe_half_width_mm = 0.05;
    cfg.onh.axial_length_mm = 7.0;
    cfg.onh.width_mm = 0.4;
    cfg.onh.height_mm = 0.5;
    cfg.capacity.macular_radius_mm = 1.0;
    cfg.capacity.max_thickness = 3;
    cfg.growth.scan_radius = 8;
    cfg.growth.direct_attach_mm = 0.1;
    cfg.runtime.workers = 3;
    cfg
}
