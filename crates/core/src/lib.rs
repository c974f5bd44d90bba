//! # satembed core
//!
//! Core types, traits and I/O shared by the satembed crates.
//!
//! This crate provides:
//! - `Raster<T>`: single-band grid for labels and change metrics
//! - `EmbeddingCube`: rows x cols x bands embedding mosaic
//! - `GeoTransform` and `CRS` for georeferencing
//! - `Region`: axis-aligned lon/lat area of interest
//! - GeoTIFF reading and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod region;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{EmbeddingCube, GeoTransform, Overlap, Raster, RasterElement, RasterStatistics};
pub use region::{create_region, Region};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{EmbeddingCube, GeoTransform, Raster, RasterElement};
    pub use crate::region::{create_region, Region};
    pub use crate::Algorithm;
}

/// Core trait for the analysis steps built on top of this crate.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
