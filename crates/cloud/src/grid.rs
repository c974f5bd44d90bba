//! Output grid planning for embedding fetches.
//!
//! Lays an EPSG:4326 pixel grid over a region at roughly the requested
//! ground sampling distance, coarsens it to respect the pixel cap, and splits
//! it into request tiles small enough for a single `getPixels` call.

use satembed_core::crs::degrees_for_meters;
use satembed_core::{GeoTransform, Region};
use tracing::warn;

use crate::error::{CloudError, Result};

/// Planned output grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchGrid {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    /// Effective ground sampling distance in metres after coarsening
    pub scale: f64,
}

/// A rectangular request window inside a [`FetchGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

impl FetchGrid {
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Transform of a request tile.
    pub fn tile_transform(&self, tile: &TileRequest) -> GeoTransform {
        self.transform.window(tile.col, tile.row)
    }
}

/// Plan a grid covering `region` at about `scale` metres per pixel.
///
/// When the grid would exceed `max_pixels`, the pixel size grows by
/// sqrt(pixels / max_pixels) and a warning is logged. A scale that is not a
/// positive finite number of metres is [`CloudError::InvalidRequest`].
pub fn plan_grid(region: &Region, scale: f64, max_pixels: usize) -> Result<FetchGrid> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(CloudError::InvalidRequest(format!(
            "scale must be a positive number of metres, got {scale}"
        )));
    }
    let (_, center_lat) = region.center();
    let max_pixels = max_pixels.max(1);

    let mut effective = scale;
    let mut dims = grid_dims(region, effective, center_lat);

    let requested = dims.0.saturating_mul(dims.1);
    if requested > max_pixels {
        let ratio = dims.0 as f64 * dims.1 as f64 / max_pixels as f64;
        effective *= ratio.sqrt();
        dims = grid_dims(region, effective, center_lat);
        // ceil() can leave the grid a row or column over the cap
        while dims.0.saturating_mul(dims.1) > max_pixels {
            effective *= 1.01;
            dims = grid_dims(region, effective, center_lat);
        }
        warn!(
            requested_pixels = requested,
            max_pixels,
            requested_scale = scale,
            effective_scale = effective,
            "region exceeds pixel cap, coarsening grid"
        );
    }

    let (rows, cols) = dims;
    let (px_x, px_y) = degrees_for_meters(effective, center_lat);

    Ok(FetchGrid {
        transform: GeoTransform::new(region.min_x(), region.max_y(), px_x, -px_y),
        rows,
        cols,
        scale: effective,
    })
}

fn grid_dims(region: &Region, scale: f64, center_lat: f64) -> (usize, usize) {
    let (px_x, px_y) = degrees_for_meters(scale, center_lat);
    // Absorb float noise so an exact multiple doesn't gain a pixel
    let rows = (region.height() / px_y - 1e-9).ceil().max(1.0) as usize;
    let cols = (region.width() / px_x - 1e-9).ceil().max(1.0) as usize;
    (rows, cols)
}

/// Split the grid into square-ish tiles of at most `max_request_pixels`, in
/// row-major order.
pub fn request_tiles(grid: &FetchGrid, max_request_pixels: usize) -> Vec<TileRequest> {
    let side = ((max_request_pixels.max(1) as f64).sqrt().floor() as usize).max(1);

    let mut tiles = Vec::new();
    for row in (0..grid.rows).step_by(side) {
        for col in (0..grid.cols).step_by(side) {
            tiles.push(TileRequest {
                row,
                col,
                rows: side.min(grid.rows - row),
                cols: side.min(grid.cols - col),
            });
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use satembed_core::create_region;

    #[test]
    fn grid_covers_region_at_scale() {
        // 0.01 deg square at the equator at ~111 m per pixel
        let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
        let grid = plan_grid(&region, 111.32, 1_000_000).unwrap();
        assert_eq!((grid.rows, grid.cols), (100, 100));
        assert_relative_eq!(grid.scale, 111.32);
        assert_relative_eq!(grid.transform.origin_x, 0.0);
        assert_relative_eq!(grid.transform.origin_y, 0.01);
        assert!(grid.transform.pixel_height < 0.0);
    }

    #[test]
    fn coarsens_to_pixel_cap() {
        let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
        let grid = plan_grid(&region, 111.32, 2_500).unwrap();
        assert!(grid.pixel_count() <= 2_500);
        assert!(grid.pixel_count() > 2_000);
        assert!(grid.scale >= 2.0 * 111.32 - 1e-9);
    }

    #[test]
    fn longitude_pixels_widen_away_from_equator() {
        let region = create_region(10.0, 59.9, 10.1, 60.1).unwrap();
        let grid = plan_grid(&region, 100.0, 10_000_000).unwrap();
        assert_relative_eq!(
            grid.transform.pixel_width,
            2.0 * grid.transform.pixel_height.abs(),
            max_relative = 1e-2
        );
    }

    #[test]
    fn tiles_partition_grid() {
        let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
        let grid = plan_grid(&region, 111.32, 1_000_000).unwrap();
        let tiles = request_tiles(&grid, 900);
        assert_eq!(tiles.len(), 16);
        let area: usize = tiles.iter().map(|t| t.rows * t.cols).sum();
        assert_eq!(area, grid.pixel_count());
        assert!(tiles.iter().all(|t| t.rows * t.cols <= 900));
        assert_eq!(tiles[1], TileRequest { row: 0, col: 30, rows: 30, cols: 30 });
        assert_eq!(tiles[15].rows, 10);
    }

    #[test]
    fn rejects_unusable_scale() {
        let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
        for scale in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let err = plan_grid(&region, scale, 1_000).unwrap_err();
            assert!(matches!(err, CloudError::InvalidRequest(_)), "scale {scale}");
        }
    }

    #[test]
    fn tiny_scale_is_coarsened_without_overflow() {
        let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
        let grid = plan_grid(&region, 1e-12, 1_000).unwrap();
        assert!(grid.pixel_count() <= 1_000);
        assert!(grid.scale > 1e-12);
    }
}
