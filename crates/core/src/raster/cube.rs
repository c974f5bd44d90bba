//! Multi-band embedding cube: one fixed-length vector per pixel

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use crate::region::Region;
use ndarray::{s, Array3, ArrayView1};

/// A georeferenced multi-band raster holding one embedding vector per pixel.
///
/// Data is shaped `(rows, cols, bands)` so each pixel vector is contiguous.
/// A pixel is valid when every band is finite; masked pixels are stored as NaN.
#[derive(Debug, Clone)]
pub struct EmbeddingCube {
    data: Array3<f32>,
    band_names: Vec<String>,
    transform: GeoTransform,
    crs: Option<CRS>,
    /// Effective ground sampling distance in metres, when known
    scale: Option<f64>,
}

/// Shared extent of two cubes on a common pixel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    pub rows: usize,
    pub cols: usize,
    /// (row, col) offset of the overlap inside the first cube
    pub left_offset: (usize, usize),
    /// (row, col) offset of the overlap inside the second cube
    pub right_offset: (usize, usize),
    /// Transform of the overlap window
    pub transform: GeoTransform,
}

// Offsets between grids must be whole pixels up to this fraction.
const ALIGNMENT_TOLERANCE: f64 = 1e-3;

impl EmbeddingCube {
    /// Build a cube from `(rows, cols, bands)` data and one name per band.
    pub fn new(data: Array3<f32>, band_names: Vec<String>) -> Result<Self> {
        let bands = data.dim().2;
        if bands == 0 || bands != band_names.len() {
            return Err(Error::BandCountMismatch {
                left: bands,
                right: band_names.len(),
            });
        }
        Ok(Self {
            data,
            band_names,
            transform: GeoTransform::default(),
            crs: None,
            scale: None,
        })
    }

    /// A cube where every pixel is masked.
    pub fn masked(rows: usize, cols: usize, band_names: Vec<String>) -> Result<Self> {
        let bands = band_names.len();
        Self::new(Array3::from_elem((rows, cols, bands), f32::NAN), band_names)
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.dim().0
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.dim().1
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Length of each embedding vector
    pub fn band_count(&self) -> usize {
        self.data.dim().2
    }

    /// Band identifiers, e.g. `A00`..`A63`
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// The embedding vector at (row, col)
    pub fn pixel(&self, row: usize, col: usize) -> Result<ArrayView1<'_, f32>> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self.data.slice(s![row, col, ..]))
    }

    /// Whether the pixel at (row, col) holds a complete vector
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.pixel(row, col)
            .map(|v| v.iter().all(|x| x.is_finite()))
            .unwrap_or(false)
    }

    /// Count of valid pixels
    pub fn valid_count(&self) -> usize {
        (0..self.rows())
            .map(|r| (0..self.cols()).filter(|&c| self.is_valid(r, c)).count())
            .sum()
    }

    /// Underlying `(rows, cols, bands)` array
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Mutable access to the underlying array
    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Effective scale in metres
    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    /// Record the effective scale in metres
    pub fn set_scale(&mut self, scale: Option<f64>) {
        self.scale = scale;
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Mask a single pixel
    pub fn mask(&mut self, row: usize, col: usize) {
        if row < self.rows() && col < self.cols() {
            self.data.slice_mut(s![row, col, ..]).fill(f32::NAN);
        }
    }

    /// Mask every pixel whose vector is all zeros (the service's fill value
    /// for masked pixels). Returns the number of pixels masked.
    pub fn mask_zero_vectors(&mut self) -> usize {
        let (rows, cols) = self.shape();
        let mut masked = 0;
        for r in 0..rows {
            for c in 0..cols {
                let mut px = self.data.slice_mut(s![r, c, ..]);
                if px.iter().all(|&v| v == 0.0) {
                    px.fill(f32::NAN);
                    masked += 1;
                }
            }
        }
        masked
    }

    /// Mask every pixel whose centre lies outside `region`. Returns the
    /// number of pixels masked.
    pub fn mask_outside(&mut self, region: &Region) -> usize {
        let gt = self.transform;
        let (rows, cols) = self.shape();
        let mut masked = 0;
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = gt.pixel_to_geo(col, row);
                if !region.contains(x, y) {
                    self.mask(row, col);
                    masked += 1;
                }
            }
        }
        masked
    }

    /// Copy a sub-window into a new cube.
    pub fn window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Result<EmbeddingCube> {
        if row + rows > self.rows() || col + cols > self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: row + rows,
                col: col + cols,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        let data = self
            .data
            .slice(s![row..row + rows, col..col + cols, ..])
            .to_owned();
        Ok(EmbeddingCube {
            data,
            band_names: self.band_names.clone(),
            transform: self.transform.window(col, row),
            crs: self.crs.clone(),
            scale: self.scale,
        })
    }

    /// Write `tile` into this cube at (row, col); only valid tile pixels are
    /// copied, so later writes sit on top of earlier ones.
    pub fn paint(&mut self, tile: &EmbeddingCube, row: usize, col: usize) -> Result<usize> {
        if tile.band_count() != self.band_count() {
            return Err(Error::BandCountMismatch {
                left: self.band_count(),
                right: tile.band_count(),
            });
        }
        if row + tile.rows() > self.rows() || col + tile.cols() > self.cols() {
            return Err(Error::SizeMismatch {
                er: self.rows().saturating_sub(row),
                ec: self.cols().saturating_sub(col),
                ar: tile.rows(),
                ac: tile.cols(),
            });
        }

        let mut painted = 0;
        for r in 0..tile.rows() {
            for c in 0..tile.cols() {
                if !tile.is_valid(r, c) {
                    continue;
                }
                self.data
                    .slice_mut(s![row + r, col + c, ..])
                    .assign(&tile.data.slice(s![r, c, ..]));
                painted += 1;
            }
        }
        Ok(painted)
    }

    /// Mosaic `other` onto this cube where the two grids overlap: valid pixels
    /// of `other` overwrite, masked ones leave this cube untouched.
    pub fn paint_over(&mut self, other: &EmbeddingCube) -> Result<usize> {
        let overlap = self.overlap(other)?;
        let (sr, sc) = overlap.right_offset;
        let window = other.window(sr, sc, overlap.rows, overlap.cols)?;
        let (dr, dc) = overlap.left_offset;
        self.paint(&window, dr, dc)
    }

    /// Compute the shared extent of two cubes.
    ///
    /// Both cubes must be north-up on the same pixel size and in equivalent
    /// CRSs, with origins a whole number of pixels apart.
    pub fn overlap(&self, other: &EmbeddingCube) -> Result<Overlap> {
        if let (Some(a), Some(b)) = (self.crs(), other.crs()) {
            if !a.is_equivalent(b) {
                return Err(Error::CrsMismatch(a.to_string(), b.to_string()));
            }
        }

        let (ta, tb) = (self.transform, other.transform);
        if !ta.is_north_up() || !tb.is_north_up() {
            return Err(Error::GridMismatch("overlap needs north-up grids without rotation".into()));
        }
        if !ta.has_same_pixel_size(&tb) {
            return Err(Error::GridMismatch(format!(
                "pixel size {}x{} vs {}x{}",
                ta.pixel_width, ta.pixel_height, tb.pixel_width, tb.pixel_height
            )));
        }

        let dc = (tb.origin_x - ta.origin_x) / ta.pixel_width;
        let dr = (tb.origin_y - ta.origin_y) / ta.pixel_height;
        if (dc - dc.round()).abs() > ALIGNMENT_TOLERANCE || (dr - dr.round()).abs() > ALIGNMENT_TOLERANCE {
            return Err(Error::GridMismatch(format!(
                "origins offset by a fractional pixel ({dc:.4}, {dr:.4})"
            )));
        }
        let (dc, dr) = (dc.round() as isize, dr.round() as isize);

        let c0 = dc.max(0);
        let c1 = (self.cols() as isize).min(dc + other.cols() as isize);
        let r0 = dr.max(0);
        let r1 = (self.rows() as isize).min(dr + other.rows() as isize);
        if c1 <= c0 || r1 <= r0 {
            return Err(Error::NoOverlap);
        }

        Ok(Overlap {
            rows: (r1 - r0) as usize,
            cols: (c1 - c0) as usize,
            left_offset: (r0 as usize, c0 as usize),
            right_offset: ((r0 - dr) as usize, (c0 - dc) as usize),
            transform: ta.window(c0 as usize, r0 as usize),
        })
    }
}
