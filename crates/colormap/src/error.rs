//! Error types for colour mapping and image output.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColormapError {
    #[error("unknown color scheme: {0}")]
    UnknownScheme(String),

    #[error("invalid hex color: {0:?}")]
    InvalidHex(String),

    #[error("palette has {available} colors, {requested} requested")]
    PaletteTooSmall { requested: usize, available: usize },

    #[error("pixel buffer of {len} bytes does not match {width}x{height} RGBA")]
    BufferSize { len: usize, width: u32, height: u32 },

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ColormapError>;
