use serde::{Deserialize, Serialize};

/// Identifier for a cell in a [`crate::grid::SpatialGrid`].
///
/// This is a row-major index into the grid's cell arena, and is only
/// meaningful within the lifetime of a given grid instance.
pub type GridIdx = usize;

/// Side of the horizontal raphe line a path is committed to.
///
/// `Superior` is the half of the field with pixel `y` below the domain
/// centre, `Inferior` the half above it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    Superior,
    Inferior,
}
