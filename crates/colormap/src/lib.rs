//! # satembed colormap
//!
//! Color mapping, categorical palettes and PNG figure output.
//!
//! Continuous schemes render change maps through [`raster_to_rgba`]; the
//! Kelly palette renders cluster labels through [`labels_to_rgba`]. The
//! [`figure`] helpers turn the buffers into upscaled panels, colour bars and
//! PNG bytes.
//!
//! ## Usage
//!
//! ```ignore
//! use satembed_colormap::{auto_params, raster_to_rgba, ColorScheme};
//!
//! let params = auto_params(&change_map, ColorScheme::Magma);
//! let rgba = raster_to_rgba(&change_map, &params);
//! ```

mod error;
pub mod figure;
mod render;
mod scheme;

pub use error::{ColormapError, Result};
pub use figure::{colorbar, compose_panels, encode_png, rgba_image, save_png, upscale_nearest};
pub use render::{auto_params, labels_to_rgba, raster_to_rgba, ColormapParams};
pub use scheme::{evaluate, kelly_palette, ColorScheme, ColorStop, Rgb, KELLY_COLORS};
