//! Output helpers shared by the clustering and change exports.

use std::path::{Path, PathBuf};

use satembed_colormap::ColormapError;
use satembed_core::crs::degrees_for_meters;
use satembed_core::io::ensure_output_dir;
use satembed_core::{Error, GeoTransform, Raster, RasterElement, Region, Result};

/// Create the parent directory of `path` if needed.
pub(crate) fn prepare_output(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_output_dir(parent)?;
    }
    Ok(path.to_path_buf())
}

pub(crate) fn render_error(path: &Path) -> impl Fn(ColormapError) -> Error + '_ {
    move |e| Error::Export {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Set cells whose centre lies outside `region` to nodata.
pub(crate) fn clip_to_region<T: RasterElement>(raster: &mut Raster<T>, region: &Region) {
    let fill = raster.nodata().unwrap_or_else(T::default_nodata);
    raster.set_nodata(Some(fill));
    let gt = *raster.transform();
    for ((row, col), cell) in raster.data_mut().indexed_iter_mut() {
        let (x, y) = gt.pixel_to_geo(col, row);
        if !region.contains(x, y) {
            *cell = fill;
        }
    }
}

/// Largest ratio of output to source pixels [`regrid_to_scale`] accepts.
pub const MAX_UPSAMPLE: usize = 16;

/// Nearest-neighbour resample onto a grid of about `scale` metres covering
/// the same extent.
///
/// Geographic (or unknown) CRSs get degree-sized pixels at the extent's
/// centre latitude; projected CRSs are assumed to be in metres. A grid of
/// more than [`MAX_UPSAMPLE`] times the source pixel count is rejected.
pub fn regrid_to_scale<T: RasterElement>(raster: &Raster<T>, scale: f64) -> Result<Raster<T>> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(Error::InvalidParameter {
            name: "scale",
            value: scale.to_string(),
            reason: "must be a positive number of metres".into(),
        });
    }

    let (min_x, min_y, max_x, max_y) = raster.bounds();
    let geographic = raster.crs().map_or(true, |c| c.is_geographic());
    let (px_x, px_y) = if geographic {
        degrees_for_meters(scale, (min_y + max_y) / 2.0)
    } else {
        (scale, scale)
    };

    let rows = ((max_y - min_y) / px_y - 1e-9).ceil().max(1.0);
    let cols = ((max_x - min_x) / px_x - 1e-9).ceil().max(1.0);
    let limit = raster.len().max(1).saturating_mul(MAX_UPSAMPLE);
    if rows * cols > limit as f64 {
        return Err(Error::InvalidParameter {
            name: "scale",
            value: scale.to_string(),
            reason: format!(
                "a {rows}x{cols} grid exceeds {MAX_UPSAMPLE} times the {} source pixels",
                raster.len()
            ),
        });
    }
    let (rows, cols) = (rows as usize, cols as usize);
    let transform = GeoTransform::new(min_x, max_y, px_x, -px_y);
    Ok(raster.resample_nearest(transform, rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use satembed_core::{create_region, CRS};

    #[test]
    fn coarser_scale_shrinks_grid() {
        let mut r = Raster::from_vec((0..16).collect::<Vec<i32>>(), 4, 4).unwrap();
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        r.set_crs(Some(CRS::from_epsg(32633)));
        r.set_nodata(Some(-1));

        let coarse = regrid_to_scale(&r, 2.0).unwrap();
        assert_eq!(coarse.shape(), (2, 2));
        // centre of the first coarse cell (1, 3) falls in source cell (1, 1)
        assert_eq!(coarse.get(0, 0).unwrap(), 5);
        assert!(regrid_to_scale(&r, 0.0).is_err());
    }

    #[test]
    fn excessive_upsampling_is_rejected() {
        let mut r = Raster::filled(8, 12, 1i32);
        r.set_transform(GeoTransform::new(-70.65, -33.44, 0.001, -0.001));
        r.set_crs(Some(CRS::wgs84()));

        let err = regrid_to_scale(&r, 1e-6).unwrap_err();
        assert!(err.is_validation());
        // about 3x finer per axis stays within the cap
        let fine = regrid_to_scale(&r, 30.0).unwrap();
        assert!(fine.len() > r.len() && fine.len() <= r.len() * MAX_UPSAMPLE);
    }

    #[test]
    fn clip_masks_outside_cells() {
        let mut r = Raster::filled(2, 2, 1.0f32);
        r.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let region = create_region(0.0, 0.0, 1.0, 2.0).unwrap();
        clip_to_region(&mut r, &region);
        assert_eq!(r.get(0, 0).unwrap(), 1.0);
        assert!(r.get(0, 1).unwrap().is_nan());
    }

    #[test]
    fn prepare_output_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.tif");
        prepare_output(&path).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }
}
