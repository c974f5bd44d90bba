//! Static figure assembly: PNG encoding, side-by-side panels and colour bars.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::{ColormapError, Result};
use crate::scheme::{evaluate, ColorScheme};

/// Figure background.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Wrap a row-major RGBA buffer as an image.
pub fn rgba_image(rgba: Vec<u8>, width: u32, height: u32) -> Result<RgbaImage> {
    let len = rgba.len();
    RgbaImage::from_raw(width, height, rgba).ok_or(ColormapError::BufferSize { len, width, height })
}

/// Encode a row-major RGBA buffer as PNG bytes.
pub fn encode_png(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let image = rgba_image(rgba.to_vec(), width, height)?;
    encode_image(&image)
}

/// Encode an image as PNG bytes.
pub fn encode_image(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Write an image to `path` as PNG.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let bytes = encode_image(image)?;
    std::fs::write(path, bytes).map_err(|source| ColormapError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Nearest-neighbour upscale by the smallest integer factor that brings the
/// shorter side to at least `min_side`. Never shrinks.
pub fn upscale_nearest(image: &RgbaImage, min_side: u32) -> RgbaImage {
    let short = image.width().min(image.height()).max(1);
    let factor = min_side.div_ceil(short).max(1);
    if factor == 1 {
        return image.clone();
    }
    imageops::resize(image, image.width() * factor, image.height() * factor, FilterType::Nearest)
}

/// Place panels left to right, top-aligned, separated and framed by `gap`
/// pixels of background.
pub fn compose_panels(panels: &[RgbaImage], gap: u32) -> RgbaImage {
    let width = panels.iter().map(|p| p.width()).sum::<u32>() + gap * (panels.len() as u32 + 1);
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0) + 2 * gap;

    let mut canvas = RgbaImage::from_pixel(width.max(1), height.max(1), BACKGROUND);
    let mut x = gap;
    for panel in panels {
        imageops::overlay(&mut canvas, panel, x as i64, gap as i64);
        x += panel.width() + gap;
    }
    canvas
}

/// Vertical colour bar: the scheme's high end at the top, low end at the bottom.
pub fn colorbar(scheme: ColorScheme, height: u32, width: u32) -> RgbaImage {
    let height = height.max(2);
    RgbaImage::from_fn(width.max(1), height, |_, y| {
        let t = 1.0 - y as f64 / (height - 1) as f64;
        Rgba(evaluate(scheme, t).to_rgba(255))
    })
}

/// Flatten transparency onto the figure background.
pub fn flatten(image: &RgbaImage) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(image.width(), image.height(), BACKGROUND);
    imageops::overlay(&mut canvas, image, 0, 0);
    canvas
}
