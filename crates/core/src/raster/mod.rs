//! Raster data structures

mod cube;
mod element;
mod geotransform;
mod grid;

pub use cube::{EmbeddingCube, Overlap};
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
