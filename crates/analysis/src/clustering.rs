//! K-means clustering analysis over one embedding cube
//!
//! Samples training vectors once, then fits and labels the whole cube for
//! any number of clusters. Results can be written as GeoTIFF, as an
//! interactive map page or as a side-by-side PNG panel.

use std::path::{Path, PathBuf};

use satembed_colormap::{compose_panels, kelly_palette, labels_to_rgba, rgba_image, save_png, upscale_nearest, Rgb};
use satembed_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use satembed_core::{EmbeddingCube, Error, GeoTransform, Raster, Region, Result, CRS};
use serde::Serialize;
use tracing::{debug, info};

use crate::export::{clip_to_region, prepare_output, regrid_to_scale, render_error};
use crate::kmeans::{Kmeans, KmeansModel, KmeansParams};
use crate::map::{render_cluster_map, ClusterMapOptions};
use crate::sampling::{sample_pixels, SampleStrategy, SampleTable};

/// Parameters for [`ClusteringAnalysis`]
#[derive(Debug, Clone)]
pub struct ClusteringParams {
    /// Training pixels drawn from the cube (default: 1000)
    pub n_samples: usize,
    /// Seed for both sampling and k-means++ (default: 100)
    pub seed: u64,
    /// Sampling strategy (default: random)
    pub strategy: SampleStrategy,
    /// Maximum Lloyd iterations (default: 100)
    pub max_iterations: usize,
    /// Centroid shift tolerance (default: 1e-4)
    pub tolerance: f64,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        let kmeans = KmeansParams::default();
        Self {
            n_samples: 1000,
            seed: kmeans.seed,
            strategy: SampleStrategy::Random,
            max_iterations: kmeans.max_iterations,
            tolerance: kmeans.tolerance,
        }
    }
}

/// Fit diagnostics for one k.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStatistics {
    pub k: usize,
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Training samples per cluster
    pub sample_sizes: Vec<usize>,
    /// Labelled pixels per cluster inside the region
    pub pixel_counts: Vec<usize>,
}

/// Cluster assignment of every pixel plus the model that produced it.
#[derive(Debug, Clone)]
pub struct ClusterResult {
    /// Cluster id per pixel in `[0, k)`, -1 for masked pixels
    pub labels: Raster<i32>,
    pub model: KmeansModel,
    pub statistics: ClusterStatistics,
}

/// A cluster GeoTIFF read back from disk.
#[derive(Debug, Clone)]
pub struct ClusterRaster {
    pub labels: Raster<i32>,
    /// (left, right, bottom, top)
    pub extent: (f64, f64, f64, f64),
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

/// Layout of [`ClusteringAnalysis::create_cluster_panel`] figures.
#[derive(Debug, Clone)]
pub struct PanelOptions {
    /// Panels are upscaled until their shorter side reaches this (default: 256)
    pub min_panel_side: u32,
    /// Background gap around and between panels (default: 8)
    pub gap: u32,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            min_panel_side: 256,
            gap: 8,
        }
    }
}

pub struct ClusteringAnalysis {
    cube: EmbeddingCube,
    region: Region,
    params: ClusteringParams,
    training: SampleTable,
}

impl ClusteringAnalysis {
    /// Build the analysis and draw its training sample.
    ///
    /// Pixels whose centre lies outside `region` are masked first, so both
    /// the sample and the labels cover the region only.
    pub fn new(mut cube: EmbeddingCube, region: Region, params: ClusteringParams) -> Result<Self> {
        let outside = cube.mask_outside(&region);
        debug!(outside, "masked pixels outside the clustering region");
        let training = sample_pixels(&cube, params.n_samples, params.strategy, params.seed)?;
        info!(
            samples = training.len(),
            requested = params.n_samples,
            bands = training.dims(),
            "drew clustering training sample"
        );
        Ok(Self {
            cube,
            region,
            params,
            training,
        })
    }

    /// The cube restricted to the region.
    pub fn cube(&self) -> &EmbeddingCube {
        &self.cube
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn params(&self) -> &ClusteringParams {
        &self.params
    }

    pub fn training(&self) -> &SampleTable {
        &self.training
    }

    /// Fit `k` clusters on the training sample and label the cube.
    ///
    /// Pixels outside the region or without a valid embedding are -1.
    pub fn get_clusters(&self, k: usize) -> Result<ClusterResult> {
        let params = KmeansParams {
            k,
            max_iterations: self.params.max_iterations,
            tolerance: self.params.tolerance,
            seed: self.params.seed,
        };
        let model = Kmeans::fit(&self.training.vectors, &params)?;
        let mut labels = model.predict_cube(&self.cube)?;
        clip_to_region(&mut labels, &self.region);

        let mut pixel_counts = vec![0usize; k];
        for &label in labels.data().iter().filter(|&&l| l >= 0) {
            pixel_counts[label as usize] += 1;
        }

        let statistics = ClusterStatistics {
            k,
            inertia: model.inertia,
            iterations: model.iterations,
            converged: model.converged,
            sample_sizes: model.sizes.clone(),
            pixel_counts,
        };
        info!(k, inertia = statistics.inertia, iterations = statistics.iterations, "clustered cube");

        Ok(ClusterResult {
            labels,
            model,
            statistics,
        })
    }

    /// Fit diagnostics for each k in `ks`.
    pub fn sweep(&self, ks: &[usize]) -> Result<Vec<ClusterStatistics>> {
        ks.iter().map(|&k| Ok(self.get_clusters(k)?.statistics)).collect()
    }

    /// Write the `k`-cluster labels as an Int32 GeoTIFF.
    ///
    /// With `scale` the labels are resampled (nearest) to pixels of about
    /// that many metres first.
    pub fn export_clusters(&self, k: usize, path: impl AsRef<Path>, scale: Option<f64>) -> Result<PathBuf> {
        let path = prepare_output(path.as_ref())?;
        let labels = self.get_clusters(k)?.labels;
        let labels = match scale {
            Some(scale) => regrid_to_scale(&labels, scale)?,
            None => labels,
        };

        write_geotiff(&labels, &path, Some(GeoTiffOptions::int32()))?;
        info!(k, path = %path.display(), "exported clusters");
        Ok(path)
    }

    /// Write an HTML map with the `k`-cluster layer over satellite imagery.
    pub fn create_interactive_map(&self, k: usize, path: impl AsRef<Path>, zoom_start: u8) -> Result<PathBuf> {
        let palette = palette_for(k)?;
        let path = prepare_output(path.as_ref())?;
        let labels = self.get_clusters(k)?.labels;

        let html = render_cluster_map(&labels, &palette, &self.region, &ClusterMapOptions::for_k(k, zoom_start))?;
        std::fs::write(&path, html).map_err(|e| Error::Export {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        info!(k, path = %path.display(), "wrote interactive map");
        Ok(path)
    }

    /// Read a cluster GeoTIFF written by [`Self::export_clusters`].
    pub fn read_cluster_raster(path: impl AsRef<Path>) -> Result<ClusterRaster> {
        let labels: Raster<i32> = read_geotiff(path.as_ref(), None)?;
        let (min_x, min_y, max_x, max_y) = labels.bounds();
        Ok(ClusterRaster {
            extent: (min_x, max_x, min_y, max_y),
            transform: *labels.transform(),
            crs: labels.crs().cloned(),
            labels,
        })
    }

    /// Render cluster GeoTIFFs side by side into one PNG, `paths[i]` coloured
    /// with the first `ks[i]` Kelly colours.
    pub fn create_cluster_panel<P: AsRef<Path>>(
        paths: &[P],
        ks: &[usize],
        output: impl AsRef<Path>,
        options: &PanelOptions,
    ) -> Result<PathBuf> {
        if paths.is_empty() || paths.len() != ks.len() {
            return Err(Error::InvalidParameter {
                name: "cluster_paths",
                value: format!("{} paths, {} k values", paths.len(), ks.len()),
                reason: "need one k value per path and at least one path".into(),
            });
        }

        let output = prepare_output(output.as_ref())?;
        let mut panels = Vec::with_capacity(paths.len());
        for (path, &k) in paths.iter().zip(ks) {
            let palette = palette_for(k)?;
            let raster = Self::read_cluster_raster(path)?;
            let (rows, cols) = raster.labels.shape();
            let rgba = labels_to_rgba(&raster.labels, &palette);
            let image = rgba_image(rgba, cols as u32, rows as u32).map_err(render_error(&output))?;
            panels.push(upscale_nearest(&image, options.min_panel_side));
            debug!(k, path = %path.as_ref().display(), rows, cols, "added cluster panel");
        }

        let figure = compose_panels(&panels, options.gap);
        save_png(&figure, &output).map_err(render_error(&output))?;
        info!(panels = panels.len(), path = %output.display(), "wrote cluster panel");
        Ok(output)
    }
}

fn palette_for(k: usize) -> Result<Vec<Rgb>> {
    if k == 0 {
        return Err(Error::InvalidParameter {
            name: "k",
            value: k.to_string(),
            reason: "must be at least 1".into(),
        });
    }
    kelly_palette(k).map_err(|e| Error::InvalidParameter {
        name: "k",
        value: k.to_string(),
        reason: e.to_string(),
    })
}
