//! Raster-to-RGBA rendering using color schemes and categorical palettes.

use crate::scheme::{evaluate, ColorScheme, Rgb};
use satembed_core::raster::{Raster, RasterElement};

/// Parameters for colormap rendering.
#[derive(Debug, Clone)]
pub struct ColormapParams {
    pub scheme: ColorScheme,
    /// Value mapped to the low end of the scheme; lower values clamp.
    pub min: f64,
    /// Value mapped to the high end of the scheme; higher values clamp.
    pub max: f64,
    /// Color for nodata pixels (RGBA). Default: fully transparent.
    pub nodata_color: [u8; 4],
}

impl ColormapParams {
    /// Params over [0, 1]; use [`auto_params`] to fit the data instead.
    pub fn new(scheme: ColorScheme) -> Self {
        Self::with_range(scheme, 0.0, 1.0)
    }

    pub fn with_range(scheme: ColorScheme, min: f64, max: f64) -> Self {
        Self {
            scheme,
            min,
            max,
            nodata_color: [0, 0, 0, 0],
        }
    }

    /// Normalized position of `v` in the range.
    pub fn normalize(&self, v: f64) -> f64 {
        let range = self.max - self.min;
        if range.abs() > f64::EPSILON {
            (v - self.min) / range
        } else {
            0.0
        }
    }
}

/// Fit `ColormapParams` to the finite, non-nodata values of a raster.
///
/// An empty raster falls back to [0, 1]; a constant one to [v, v + 1].
pub fn auto_params<T: RasterElement>(raster: &Raster<T>, scheme: ColorScheme) -> ColormapParams {
    let nodata = raster.nodata();
    let (min, max) = raster
        .data()
        .iter()
        .filter(|v| !v.is_nodata(nodata))
        .filter_map(|v| v.to_f64())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !min.is_finite() || !max.is_finite() {
        ColormapParams::with_range(scheme, 0.0, 1.0)
    } else if (max - min).abs() < f64::EPSILON {
        ColormapParams::with_range(scheme, min, min + 1.0)
    } else {
        ColormapParams::with_range(scheme, min, max)
    }
}

/// Convert a raster to an RGBA pixel buffer.
///
/// Returns a `Vec<u8>` of length `rows * cols * 4` in row-major order.
/// Nodata and non-finite cells take `params.nodata_color`.
pub fn raster_to_rgba<T: RasterElement>(raster: &Raster<T>, params: &ColormapParams) -> Vec<u8> {
    let nodata = raster.nodata();
    let mut rgba = vec![0u8; raster.len() * 4];

    for (px, val) in rgba.chunks_exact_mut(4).zip(raster.data().iter()) {
        let value = if val.is_nodata(nodata) { None } else { val.to_f64() };
        match value {
            Some(v) if v.is_finite() => {
                let color = evaluate(params.scheme, params.normalize(v));
                px.copy_from_slice(&color.to_rgba(255));
            }
            _ => px.copy_from_slice(&params.nodata_color),
        }
    }

    rgba
}

/// Render an integer label raster with one palette colour per label.
///
/// Label `i` takes `palette[i]`; nodata and labels outside the palette are
/// transparent.
pub fn labels_to_rgba(labels: &Raster<i32>, palette: &[Rgb]) -> Vec<u8> {
    let nodata = labels.nodata();
    let mut rgba = vec![0u8; labels.len() * 4];

    for (px, &label) in rgba.chunks_exact_mut(4).zip(labels.data().iter()) {
        if label.is_nodata(nodata) || label < 0 {
            continue;
        }
        if let Some(color) = palette.get(label as usize) {
            px.copy_from_slice(&color.to_rgba(255));
        }
    }

    rgba
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::kelly_palette;

    #[test]
    fn grayscale_ramp_with_transparent_nodata() {
        let mut r = Raster::<f64>::new(2, 2);
        r.set(0, 0, 0.0).unwrap();
        r.set(0, 1, 0.5).unwrap();
        r.set(1, 0, 1.0).unwrap();
        r.set(1, 1, f64::NAN).unwrap();
        r.set_nodata(Some(f64::NAN));

        let params = ColormapParams::with_range(ColorScheme::Grayscale, 0.0, 1.0);
        let rgba = raster_to_rgba(&r, &params);

        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[0, 0, 0, 255]);
        assert_eq!(&rgba[4..8], &[128, 128, 128, 255]);
        assert_eq!(&rgba[8..12], &[255, 255, 255, 255]);
        assert_eq!(&rgba[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn auto_params_range() {
        let r = Raster::from_vec(vec![10.0f32, 50.0, f32::NAN, 100.0], 1, 4).unwrap();
        let params = auto_params(&r, ColorScheme::Magma);
        assert!((params.min - 10.0).abs() < f64::EPSILON);
        assert!((params.max - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn auto_params_degenerate_inputs() {
        let empty = Raster::<f64>::filled(1, 2, f64::NAN);
        let p = auto_params(&empty, ColorScheme::Magma);
        assert_eq!((p.min, p.max), (0.0, 1.0));

        let constant = Raster::<f64>::filled(2, 2, 42.0);
        let p = auto_params(&constant, ColorScheme::Magma);
        assert_eq!((p.min, p.max), (42.0, 43.0));
    }

    #[test]
    fn labels_use_palette_order() {
        let mut labels = Raster::from_vec(vec![0, 1, -1, 7], 2, 2).unwrap();
        labels.set_nodata(Some(-1));
        let palette = kelly_palette(2).unwrap();
        let rgba = labels_to_rgba(&labels, &palette);

        assert_eq!(&rgba[0..4], &[0xF3, 0xC3, 0x00, 255]);
        assert_eq!(&rgba[4..8], &[0x87, 0x56, 0x92, 255]);
        // nodata and out-of-palette labels stay transparent
        assert_eq!(rgba[11], 0);
        assert_eq!(rgba[15], 0);
    }
}
