//! Error types for the weather CNN library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum Error {
    /// Rectangular kernel passed where a square one is required
    #[error("periodic convolutions require square kernels, got {rows}x{cols}")]
    NonSquareKernel { rows: usize, cols: usize },

    /// Parallel layer specification vectors disagree in length
    #[error("layer specification mismatch: {filters} filter entries vs {kernels} kernel entries")]
    LayerSpecMismatch { filters: usize, kernels: usize },

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Output channel count does not match the variable dictionary
    #[error("channel mismatch: variable dictionary implies {expected} channels, output has {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// Coordinate array length disagrees with the field tensor
    #[error("dimension mismatch on {axis} axis: coordinate has {coord} entries, field has {field}")]
    DimensionMismatch {
        axis: &'static str,
        coord: usize,
        field: usize,
    },

    /// Unknown variable name
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;
