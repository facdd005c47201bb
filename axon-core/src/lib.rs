//! Core library for growing retinal ganglion cell axon paths to the optic
//! nerve head under per-location capacity limits.
//!
//! Main components:
//! - [`config`]: TOML-backed run configuration.
//! - [`geometry`]: pixel-space layout and the capacity formula.
//! - [`scan_points`]: nearest-first offsets for directional detour search.
//! - [`grid`]: capacity grid with memoised next hops toward the ONH.
//! - [`density`]: ganglion cell density lookup.
//! - [`cell_field`]: sampled source cells, sorted by distance to the ONH.
//! - [`growth`]: the sequential path growth engine.
//! - [`partition`]: row-band parallelism for the setup phases.
//! - [`phases`]: high-level run pipeline.
//! - [`error`]: crate error type.
//! - [`types`]: shared type aliases and small enums.

pub mod cell_field;
pub mod config;
pub mod density;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod growth;
pub mod partition;
pub mod phases;
pub mod scan_points;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AxonError, Result};
