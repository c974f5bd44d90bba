//! Satellite embedding retrieval.
//!
//! [`get_satellite_embeddings`] resolves the annual embedding images that
//! intersect a region and time window into an [`EmbeddingImage`] handle.
//! Pixels only cross the network when the handle is materialized with
//! [`EmbeddingImage::fetch_cube`], on a grid bounded by the pixel cap.

use std::sync::Arc;

use futures::stream::{FuturesOrdered, StreamExt};
use satembed_core::io::read_embedding_cube_from_buffer;
use satembed_core::{EmbeddingCube, Region, CRS};
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::earth_engine::EarthEngineClient;
use crate::ee_models::{EeImage, PixelGrid};
use crate::error::{CloudError, Result};
use crate::grid::{plan_grid, request_tiles, FetchGrid, TileRequest};
use crate::session::Session;

/// Band count of the annual embedding product (`A00` .. `A63`).
pub const EMBEDDING_DIMENSIONS: usize = 64;

const GRID_CRS: &str = "EPSG:4326";

/// Materialization settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOptions {
    /// Target ground sampling distance in metres (default 10).
    pub scale: f64,
    /// Cap on output rows x cols (default 1 000 000).
    pub max_pixels: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            scale: config.scale,
            max_pixels: config.max_pixels,
        }
    }
}

/// Server-side handle on the embedding images covering a region and period.
///
/// Equivalent to the collection filtered by date and bounds and mosaicked;
/// the images are kept in start-time order so later years paint on top.
#[derive(Clone)]
pub struct EmbeddingImage {
    client: Arc<EarthEngineClient>,
    fetch: FetchConfig,
    region: Region,
    year_start: i32,
    year_end: i32,
    images: Vec<EeImage>,
    band_names: Vec<String>,
}

/// Find the embedding images of `[year_start, year_end)` that intersect
/// `region`.
///
/// An empty match is [`CloudError::DataUnavailable`]; a non-increasing year
/// range is [`CloudError::InvalidRequest`].
pub async fn get_satellite_embeddings(
    session: &Session,
    region: &Region,
    year_start: i32,
    year_end: i32,
) -> Result<EmbeddingImage> {
    validate_years(year_start, year_end)?;

    let collection = &session.config().earth_engine.collection;
    let start_time = format!("{year_start:04}-01-01T00:00:00Z");
    let end_time = format!("{year_end:04}-01-01T00:00:00Z");

    let mut images = session
        .client()
        .list_images(collection, &start_time, &end_time, region)
        .await?;
    if images.is_empty() {
        return Err(CloudError::DataUnavailable(format!(
            "no {collection} images intersect {:?} between {year_start} and {year_end}",
            region.bounds()
        )));
    }
    images.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    let band_names = band_names_of(&images)?;
    info!(
        images = images.len(),
        bands = band_names.len(),
        year_start,
        year_end,
        "resolved satellite embeddings"
    );

    Ok(EmbeddingImage {
        client: Arc::clone(session.client()),
        fetch: session.config().fetch.clone(),
        region: *region,
        year_start,
        year_end,
        images,
        band_names,
    })
}

fn validate_years(year_start: i32, year_end: i32) -> Result<()> {
    if !(1..=9999).contains(&year_start) || !(1..=9999).contains(&year_end) {
        return Err(CloudError::InvalidRequest(format!(
            "years must be in 1..=9999, got {year_start}..{year_end}"
        )));
    }
    if year_start >= year_end {
        return Err(CloudError::InvalidRequest(format!(
            "year_start ({year_start}) must be before year_end ({year_end}); the end year is exclusive"
        )));
    }
    Ok(())
}

/// Band ids shared by every image, in the first image's order.
fn band_names_of(images: &[EeImage]) -> Result<Vec<String>> {
    let names: Vec<String> = match images.iter().find(|img| !img.bands.is_empty()) {
        Some(img) => img.bands.iter().map(|b| b.id.clone()).collect(),
        None => (0..EMBEDDING_DIMENSIONS).map(|i| format!("A{i:02}")).collect(),
    };

    for img in images.iter().filter(|img| !img.bands.is_empty()) {
        if img.bands.len() != names.len() || img.bands.iter().zip(&names).any(|(b, n)| &b.id != n) {
            return Err(CloudError::InvalidRequest(format!(
                "image {} has a different band layout",
                img.name
            )));
        }
    }
    Ok(names)
}

impl EmbeddingImage {
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn years(&self) -> (i32, i32) {
        (self.year_start, self.year_end)
    }

    pub fn images(&self) -> &[EeImage] {
        &self.images
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    pub fn band_count(&self) -> usize {
        self.band_names.len()
    }

    /// The grid [`fetch_cube`](Self::fetch_cube) would use.
    pub fn plan(&self, options: &FetchOptions) -> Result<FetchGrid> {
        plan_grid(&self.region, options.scale, options.max_pixels)
    }

    /// Materialize the mosaic as an [`EmbeddingCube`] clipped to the region.
    ///
    /// Masked pixels (all-zero vectors) and pixels whose centre lies outside
    /// the region are NaN. The cube records the effective scale.
    pub async fn fetch_cube(&self, options: &FetchOptions) -> Result<EmbeddingCube> {
        let grid = self.plan(options)?;
        let tiles = request_tiles(&grid, self.fetch.max_request_pixels);
        info!(
            rows = grid.rows,
            cols = grid.cols,
            scale = grid.scale,
            images = self.images.len(),
            requests = self.images.len() * tiles.len(),
            "fetching embedding cube"
        );

        let mut mosaic = EmbeddingCube::masked(grid.rows, grid.cols, self.band_names.clone())?;
        mosaic.set_transform(grid.transform);
        mosaic.set_crs(Some(CRS::wgs84()));
        mosaic.set_scale(Some(grid.scale));

        // Image-major order: painting in sequence leaves later images on top.
        let jobs: Vec<(&EeImage, TileRequest)> = self
            .images
            .iter()
            .flat_map(|img| tiles.iter().map(move |t| (img, *t)))
            .collect();

        let batch_size = self.fetch.max_concurrent_fetches.max(1);
        for chunk in jobs.chunks(batch_size) {
            let mut futs = FuturesOrdered::new();
            for (img, tile) in chunk {
                futs.push_back(self.fetch_tile(img, &grid, *tile));
            }
            while let Some(res) = futs.next().await {
                let (tile, cube) = res?;
                mosaic.paint(&cube, tile.row, tile.col)?;
            }
        }

        let outside = mosaic.mask_outside(&self.region);
        debug!(outside, valid = mosaic.valid_count(), "clipped mosaic to region");
        Ok(mosaic)
    }

    /// Fetch a coarse cube sized for about `n_samples` draws (four pixels per
    /// sample, never above the configured pixel cap).
    pub async fn sample_cube(&self, n_samples: usize) -> Result<EmbeddingCube> {
        let options = FetchOptions {
            scale: self.fetch.scale,
            max_pixels: n_samples.saturating_mul(4).clamp(1, self.fetch.max_pixels),
        };
        self.fetch_cube(&options).await
    }

    async fn fetch_tile(
        &self,
        image: &EeImage,
        grid: &FetchGrid,
        tile: TileRequest,
    ) -> Result<(TileRequest, EmbeddingCube)> {
        let transform = grid.tile_transform(&tile);
        let pixel_grid = PixelGrid::new(&transform, tile.cols, tile.rows, GRID_CRS);
        debug!(image = %image.name, row = tile.row, col = tile.col, rows = tile.rows, cols = tile.cols, "getPixels");

        let bytes = self.client.get_pixels(&image.name, &self.band_names, pixel_grid).await?;
        let mut cube = read_embedding_cube_from_buffer(&bytes, &self.band_names)
            .map_err(|e| CloudError::InvalidTiff { reason: e.to_string() })?;

        if cube.shape() != (tile.rows, tile.cols) {
            return Err(CloudError::InvalidTiff {
                reason: format!(
                    "expected {}x{} pixels from {}, got {}x{}",
                    tile.rows,
                    tile.cols,
                    image.name,
                    cube.rows(),
                    cube.cols()
                ),
            });
        }
        cube.mask_zero_vectors();
        cube.set_transform(transform);
        Ok((tile, cube))
    }
}

impl std::fmt::Debug for EmbeddingImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingImage")
            .field("region", &self.region)
            .field("years", &(self.year_start, self.year_end))
            .field("images", &self.images.len())
            .field("bands", &self.band_names.len())
            .finish()
    }
}

impl Session {
    /// Shorthand for [`get_satellite_embeddings`] on this session.
    pub async fn get_satellite_embeddings(
        &self,
        region: &Region,
        year_start: i32,
        year_end: i32,
    ) -> Result<EmbeddingImage> {
        get_satellite_embeddings(self, region, year_start, year_end).await
    }

    /// Materialize `image` with explicit options.
    pub async fn fetch_cube(&self, image: &EmbeddingImage, options: &FetchOptions) -> Result<EmbeddingCube> {
        image.fetch_cube(options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ee_models::EeBand;

    fn image(name: &str, bands: &[&str]) -> EeImage {
        EeImage {
            name: name.to_string(),
            id: None,
            start_time: None,
            end_time: None,
            bands: bands.iter().map(|b| EeBand { id: b.to_string() }).collect(),
        }
    }

    #[test]
    fn year_range_is_end_exclusive() {
        assert!(validate_years(2023, 2024).is_ok());
        assert!(matches!(validate_years(2024, 2024), Err(CloudError::InvalidRequest(_))));
        assert!(matches!(validate_years(2025, 2024), Err(CloudError::InvalidRequest(_))));
    }

    #[test]
    fn band_names_default_to_embedding_axes() {
        let names = band_names_of(&[image("a", &[])]).unwrap();
        assert_eq!(names.len(), EMBEDDING_DIMENSIONS);
        assert_eq!(names[0], "A00");
        assert_eq!(names[63], "A63");
    }

    #[test]
    fn band_layouts_must_agree() {
        let ok = [image("a", &["A00", "A01"]), image("b", &["A00", "A01"])];
        assert_eq!(band_names_of(&ok).unwrap(), vec!["A00", "A01"]);
        let bad = [image("a", &["A00", "A01"]), image("b", &["A01", "A00"])];
        assert!(band_names_of(&bad).is_err());
    }
}
