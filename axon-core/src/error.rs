//! Error types for axon-core.

use thiserror::Error;

/// Fatal errors raised while setting up or running a simulation.
///
/// Per-cell growth failures are not errors at this level; see
/// [`crate::growth::GrowthFailure`].
#[derive(Error, Debug)]
pub enum AxonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Setup error: {0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, AxonError>;
