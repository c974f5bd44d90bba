//! Error types for satembed core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for raster, region and I/O operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Band count mismatch: {left} vs {right}")]
    BandCountMismatch { left: usize, right: usize },

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Rasters do not overlap")]
    NoOverlap,

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Invalid region ({xmin}, {ymin}, {xmax}, {ymax}): {reason}")]
    InvalidRegion {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
        reason: String,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Export to {path} failed: {reason}")]
    Export { path: PathBuf, reason: String },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error falls in the validation family (bad caller input).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidRegion { .. }
                | Error::InvalidParameter { .. }
                | Error::BandCountMismatch { .. }
                | Error::InvalidDimensions { .. }
        )
    }
}

/// Result type alias for satembed core operations
pub type Result<T> = std::result::Result<T, Error>;
