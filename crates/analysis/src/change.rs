//! Change detection between two embedding cubes
//!
//! Both metrics are computed per pixel over the shared extent of the two
//! cubes:
//! - mean absolute difference: mean over bands of |after - before|
//! - cosine similarity: dot(before, after) / (|before| |after|), in [-1, 1]
//!
//! Pixels that are masked in either cube, fall outside the region, or (for
//! cosine) have a zero-magnitude vector are NaN, which is also the output's
//! nodata value.

use std::path::{Path, PathBuf};

use ndarray::ArrayView1;
use satembed_colormap::figure::flatten;
use satembed_colormap::{auto_params, colorbar, compose_panels, raster_to_rgba, rgba_image, save_png, upscale_nearest};
use satembed_colormap::{ColorScheme, ColormapParams};
use satembed_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use satembed_core::{Algorithm, EmbeddingCube, Error, Overlap, Raster, Region, Result};
use tracing::{debug, info};

use crate::export::{clip_to_region, prepare_output, regrid_to_scale, render_error};
use crate::maybe_rayon::*;

/// Two cubes on the same grid, pixel for pixel.
#[derive(Debug, Clone)]
pub struct CubePair {
    pub before: EmbeddingCube,
    pub after: EmbeddingCube,
}

impl CubePair {
    /// Cut `t1` and `t2` down to their overlap.
    pub fn aligned(t1: &EmbeddingCube, t2: &EmbeddingCube) -> Result<(Self, Overlap)> {
        if t1.band_count() != t2.band_count() {
            return Err(Error::BandCountMismatch {
                left: t1.band_count(),
                right: t2.band_count(),
            });
        }
        let overlap = t1.overlap(t2)?;
        let (r1, c1) = overlap.left_offset;
        let (r2, c2) = overlap.right_offset;
        let pair = Self {
            before: t1.window(r1, c1, overlap.rows, overlap.cols)?,
            after: t2.window(r2, c2, overlap.rows, overlap.cols)?,
        };
        Ok((pair, overlap))
    }

    fn check(&self) -> Result<()> {
        if self.before.band_count() != self.after.band_count() {
            return Err(Error::BandCountMismatch {
                left: self.before.band_count(),
                right: self.after.band_count(),
            });
        }
        if self.before.shape() != self.after.shape() {
            let ((er, ec), (ar, ac)) = (self.before.shape(), self.after.shape());
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(())
    }
}

/// Per-pixel mean absolute difference
#[derive(Debug, Clone, Default)]
pub struct MeanAbsoluteDifference;

impl Algorithm for MeanAbsoluteDifference {
    type Input = CubePair;
    type Output = Raster<f32>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Mean Absolute Difference"
    }

    fn description(&self) -> &'static str {
        "Mean over bands of the absolute difference between two embeddings"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        mean_absolute_difference(&input)
    }
}

/// Per-pixel cosine similarity
#[derive(Debug, Clone, Default)]
pub struct CosineSimilarity;

impl Algorithm for CosineSimilarity {
    type Input = CubePair;
    type Output = Raster<f32>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Cosine Similarity"
    }

    fn description(&self) -> &'static str {
        "Cosine of the angle between two embeddings, NaN for zero vectors"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        cosine_similarity(&input)
    }
}

pub fn mean_absolute_difference(pair: &CubePair) -> Result<Raster<f32>> {
    pixel_metric(pair, |a, b| {
        let sum: f64 = a.iter().zip(b).map(|(x, y)| (*y as f64 - *x as f64).abs()).sum();
        (sum / a.len() as f64) as f32
    })
}

pub fn cosine_similarity(pair: &CubePair) -> Result<Raster<f32>> {
    pixel_metric(pair, |a, b| {
        let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
        for (&x, &y) in a.iter().zip(b) {
            let (x, y) = (x as f64, y as f64);
            dot += x * y;
            na += x * x;
            nb += y * y;
        }
        let den = na.sqrt() * nb.sqrt();
        if den == 0.0 {
            f32::NAN
        } else {
            (dot / den).clamp(-1.0, 1.0) as f32
        }
    })
}

/// Apply `metric` to every pixel valid in both cubes.
fn pixel_metric<F>(pair: &CubePair, metric: F) -> Result<Raster<f32>>
where
    F: Fn(ArrayView1<'_, f32>, ArrayView1<'_, f32>) -> f32 + Sync,
{
    pair.check()?;
    let (rows, cols) = pair.before.shape();
    let (before, after) = (pair.before.data(), pair.after.data());

    let output: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f32::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let a = before.slice(ndarray::s![row, col, ..]);
                let b = after.slice(ndarray::s![row, col, ..]);
                if a.iter().chain(b.iter()).all(|v| v.is_finite()) {
                    *out = metric(a, b);
                }
            }
            row_data
        })
        .collect();

    let mut raster = Raster::from_vec(output, rows, cols)?;
    raster.set_transform(*pair.before.transform());
    raster.set_crs(pair.before.crs().cloned());
    raster.set_nodata(Some(f32::NAN));
    Ok(raster)
}

/// Options for [`ChangeDetectionAnalysis::visualize_change_map`]
#[derive(Debug, Clone)]
pub struct VisualizeOptions {
    pub scheme: ColorScheme,
    /// Low end of the colour range; the data minimum when unset
    pub vmin: Option<f64>,
    /// High end of the colour range; the data maximum when unset
    pub vmax: Option<f64>,
    /// Append a vertical colour bar to the right of the map
    pub colorbar: bool,
    /// The map is upscaled until its shorter side reaches this
    pub min_side: u32,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        Self {
            scheme: ColorScheme::Magma,
            vmin: None,
            vmax: None,
            colorbar: true,
            min_side: 512,
        }
    }
}

pub struct ChangeDetectionAnalysis {
    pair: CubePair,
    overlap: Overlap,
    region: Region,
}

impl ChangeDetectionAnalysis {
    /// Pair two periods over `region`.
    ///
    /// Fails when the band counts differ or the cubes do not overlap on a
    /// common grid.
    pub fn new(t1: &EmbeddingCube, t2: &EmbeddingCube, region: Region) -> Result<Self> {
        let (pair, overlap) = CubePair::aligned(t1, t2)?;
        info!(
            rows = overlap.rows,
            cols = overlap.cols,
            bands = t1.band_count(),
            "paired embedding cubes"
        );
        Ok(Self { pair, overlap, region })
    }

    /// Shared extent of the two periods.
    pub fn overlap(&self) -> &Overlap {
        &self.overlap
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn compute_mean_absolute_difference(&self) -> Result<Raster<f32>> {
        let mut raster = mean_absolute_difference(&self.pair)?;
        clip_to_region(&mut raster, &self.region);
        debug!(valid = valid_count(&raster), "computed mean absolute difference");
        Ok(raster)
    }

    /// Cosine similarity, NaN where either vector has zero magnitude.
    pub fn compute_cosine_similarity(&self) -> Result<Raster<f32>> {
        let mut raster = cosine_similarity(&self.pair)?;
        clip_to_region(&mut raster, &self.region);
        debug!(valid = valid_count(&raster), "computed cosine similarity");
        Ok(raster)
    }

    /// Write a change map as a Float32 GeoTIFF, optionally resampled to
    /// pixels of about `scale` metres.
    pub fn export_change_map(&self, raster: &Raster<f32>, path: impl AsRef<Path>, scale: Option<f64>) -> Result<PathBuf> {
        let path = prepare_output(path.as_ref())?;
        match scale {
            Some(scale) => write_geotiff(&regrid_to_scale(raster, scale)?, &path, None)?,
            None => write_geotiff(raster, &path, None)?,
        }
        info!(path = %path.display(), "exported change map");
        Ok(path)
    }

    /// Render a change GeoTIFF to PNG.
    pub fn visualize_change_map(
        tif_path: impl AsRef<Path>,
        output: impl AsRef<Path>,
        options: &VisualizeOptions,
    ) -> Result<PathBuf> {
        let output = prepare_output(output.as_ref())?;
        let raster: Raster<f32> = read_geotiff(tif_path.as_ref(), None)?;

        let fitted = auto_params(&raster, options.scheme);
        let params = ColormapParams::with_range(
            options.scheme,
            options.vmin.unwrap_or(fitted.min),
            options.vmax.unwrap_or(fitted.max),
        );

        let (rows, cols) = raster.shape();
        let rgba = raster_to_rgba(&raster, &params);
        let map = rgba_image(rgba, cols as u32, rows as u32).map_err(render_error(&output))?;
        let map = flatten(&upscale_nearest(&map, options.min_side));

        let figure = if options.colorbar {
            let bar_width = (map.height() / 20).max(12);
            let bar = colorbar(options.scheme, map.height(), bar_width);
            compose_panels(&[map, bar], bar_width)
        } else {
            map
        };

        save_png(&figure, &output).map_err(render_error(&output))?;
        info!(
            path = %output.display(),
            vmin = params.min,
            vmax = params.max,
            "wrote change map figure"
        );
        Ok(output)
    }
}

fn valid_count(raster: &Raster<f32>) -> usize {
    raster.data().iter().filter(|v| v.is_finite()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array3};
    use satembed_core::{create_region, GeoTransform};

    fn cube(rows: usize, cols: usize, origin: (f64, f64), pixel: [f32; 2]) -> EmbeddingCube {
        let data = Array3::from_shape_fn((rows, cols, 2), |(_, _, b)| pixel[b]);
        let mut c = EmbeddingCube::new(data, vec!["A00".into(), "A01".into()]).unwrap();
        c.set_transform(GeoTransform::new(origin.0, origin.1, 1.0, -1.0));
        c
    }

    fn everywhere() -> Region {
        create_region(-100.0, -100.0, 100.0, 100.0).unwrap()
    }

    #[test]
    fn identical_cubes_have_zero_difference() {
        let c = cube(3, 3, (0.0, 3.0), [0.3, -0.4]);
        let a = ChangeDetectionAnalysis::new(&c, &c, everywhere()).unwrap();
        let mad = a.compute_mean_absolute_difference().unwrap();
        assert!(mad.data().iter().all(|&v| v == 0.0));
        let cos = a.compute_cosine_similarity().unwrap();
        for &v in cos.data().iter() {
            assert_relative_eq!(v, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn metrics_follow_their_formulas() {
        let t1 = cube(1, 1, (0.0, 1.0), [1.0, 0.0]);
        let t2 = cube(1, 1, (0.0, 1.0), [0.0, 2.0]);
        let a = ChangeDetectionAnalysis::new(&t1, &t2, everywhere()).unwrap();
        assert_relative_eq!(a.compute_mean_absolute_difference().unwrap().get(0, 0).unwrap(), 1.5);
        assert_relative_eq!(a.compute_cosine_similarity().unwrap().get(0, 0).unwrap(), 0.0);

        let opposite = cube(1, 1, (0.0, 1.0), [-3.0, 0.0]);
        let a = ChangeDetectionAnalysis::new(&t1, &opposite, everywhere()).unwrap();
        assert_relative_eq!(a.compute_cosine_similarity().unwrap().get(0, 0).unwrap(), -1.0);
    }

    #[test]
    fn zero_vector_gives_nan_sentinel() {
        let mut t1 = cube(1, 2, (0.0, 1.0), [0.5, 0.5]);
        t1.data_mut().slice_mut(ndarray::s![0, 1, ..]).assign(&array![0.0, 0.0]);
        let t2 = cube(1, 2, (0.0, 1.0), [0.5, 0.1]);
        let cos = ChangeDetectionAnalysis::new(&t1, &t2, everywhere())
            .unwrap()
            .compute_cosine_similarity()
            .unwrap();
        assert!(cos.get(0, 0).unwrap().is_finite());
        assert!(cos.get(0, 1).unwrap().is_nan());
        assert!(cos.nodata().unwrap().is_nan());
    }

    #[test]
    fn output_covers_the_overlap() {
        // t2 is shifted one pixel right and one down
        let t1 = cube(4, 5, (0.0, 4.0), [1.0, 1.0]);
        let t2 = cube(4, 5, (1.0, 3.0), [1.0, 2.0]);
        let a = ChangeDetectionAnalysis::new(&t1, &t2, everywhere()).unwrap();
        let mad = a.compute_mean_absolute_difference().unwrap();
        assert_eq!(mad.shape(), (3, 4));
        assert_eq!(mad.transform().origin_x, 1.0);
        assert_eq!(mad.transform().origin_y, 3.0);
        assert_relative_eq!(mad.get(0, 0).unwrap(), 0.5);
    }

    #[test]
    fn masked_and_outside_pixels_are_nan() {
        let mut t1 = cube(2, 2, (0.0, 2.0), [1.0, 1.0]);
        t1.mask(0, 0);
        let t2 = cube(2, 2, (0.0, 2.0), [1.0, 3.0]);
        let region = create_region(0.0, 0.0, 2.0, 1.0).unwrap();
        let mad = ChangeDetectionAnalysis::new(&t1, &t2, region)
            .unwrap()
            .compute_mean_absolute_difference()
            .unwrap();
        // row 0 lies above the region
        assert!(mad.get(0, 0).unwrap().is_nan());
        assert!(mad.get(0, 1).unwrap().is_nan());
        assert_relative_eq!(mad.get(1, 0).unwrap(), 1.0);
    }

    #[test]
    fn band_count_mismatch_is_rejected() {
        let t1 = cube(1, 1, (0.0, 1.0), [1.0, 1.0]);
        let t2 = EmbeddingCube::new(Array3::zeros((1, 1, 3)), vec!["a".into(), "b".into(), "c".into()]).unwrap();
        let err = ChangeDetectionAnalysis::new(&t1, &t2, everywhere()).err().unwrap();
        assert!(matches!(err, Error::BandCountMismatch { left: 2, right: 3 }));
    }

    #[test]
    fn algorithms_run_on_aligned_pairs() {
        let t1 = cube(2, 2, (0.0, 2.0), [1.0, 0.0]);
        let t2 = cube(2, 2, (0.0, 2.0), [1.0, 1.0]);
        let (pair, _) = CubePair::aligned(&t1, &t2).unwrap();
        let mad = MeanAbsoluteDifference.execute_default(pair.clone()).unwrap();
        assert_relative_eq!(mad.get(1, 1).unwrap(), 0.5);
        let cos = CosineSimilarity.execute_default(pair).unwrap();
        assert_relative_eq!(cos.get(1, 1).unwrap(), std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
    }
}
