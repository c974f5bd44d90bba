//! # satembed analysis
//!
//! Clustering and change detection over satellite embedding cubes.
//!
//! - **sampling**: random or grid training samples of valid pixels
//! - **kmeans**: seeded k-means++ / Lloyd clustering
//! - **clustering**: [`ClusteringAnalysis`] with GeoTIFF, HTML map and PNG panel output
//! - **change**: [`ChangeDetectionAnalysis`] with mean absolute difference and cosine similarity

pub mod change;
pub mod clustering;
mod export;
pub mod kmeans;
pub mod map;
mod maybe_rayon;
pub mod sampling;

pub use change::{ChangeDetectionAnalysis, CosineSimilarity, CubePair, MeanAbsoluteDifference, VisualizeOptions};
pub use clustering::{ClusterRaster, ClusterResult, ClusterStatistics, ClusteringAnalysis, ClusteringParams, PanelOptions};
pub use export::{regrid_to_scale, MAX_UPSAMPLE};
pub use kmeans::{Kmeans, KmeansModel, KmeansParams};
pub use sampling::{sample_pixels, SampleStrategy, SampleTable};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change::{ChangeDetectionAnalysis, VisualizeOptions};
    pub use crate::clustering::{ClusteringAnalysis, ClusteringParams, PanelOptions};
    pub use crate::sampling::SampleStrategy;
    pub use satembed_colormap::ColorScheme;
    pub use satembed_core::prelude::*;
}
