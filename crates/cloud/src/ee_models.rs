//! Earth Engine REST data types.
//!
//! Lightweight serde models for the subset of the v1 API used here:
//! `listImages` responses and `getPixels` requests.

use serde::{Deserialize, Serialize};

use satembed_core::GeoTransform;

// ---------------------------------------------------------------------------
// listImages
// ---------------------------------------------------------------------------

/// One page of `GET {parent}:listImages`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesResponse {
    #[serde(default)]
    pub images: Vec<EeImage>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Image metadata as returned by the asset listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EeImage {
    /// Full resource name, e.g. `projects/earthengine-public/assets/...`
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub bands: Vec<EeBand>,
}

/// Band entry of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EeBand {
    pub id: String,
}

/// `GET projects/{project}:listAssets` (only used to verify credentials).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAssetsResponse {
    #[serde(default)]
    pub assets: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// getPixels
// ---------------------------------------------------------------------------

/// Body for `POST {image}:getPixels`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPixelsRequest {
    pub file_format: String,
    pub band_ids: Vec<String>,
    pub grid: PixelGrid,
}

impl GetPixelsRequest {
    /// GeoTIFF request for `band_ids` on `grid`.
    pub fn geotiff(band_ids: &[String], grid: PixelGrid) -> Self {
        Self {
            file_format: "GEO_TIFF".to_string(),
            band_ids: band_ids.to_vec(),
            grid,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelGrid {
    pub dimensions: GridDimensions,
    pub affine_transform: AffineTransform,
    pub crs_code: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GridDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffineTransform {
    pub scale_x: f64,
    pub shear_x: f64,
    pub translate_x: f64,
    pub shear_y: f64,
    pub scale_y: f64,
    pub translate_y: f64,
}

impl From<&GeoTransform> for AffineTransform {
    fn from(gt: &GeoTransform) -> Self {
        Self {
            scale_x: gt.pixel_width,
            shear_x: gt.row_rotation,
            translate_x: gt.origin_x,
            shear_y: gt.col_rotation,
            scale_y: gt.pixel_height,
            translate_y: gt.origin_y,
        }
    }
}

impl PixelGrid {
    pub fn new(transform: &GeoTransform, width: usize, height: usize, crs_code: &str) -> Self {
        Self {
            dimensions: GridDimensions {
                width: width as u32,
                height: height as u32,
            },
            affine_transform: AffineTransform::from(transform),
            crs_code: crs_code.to_string(),
        }
    }
}
