//! Color schemes, categorical palettes and multi-stop interpolation.

use crate::error::{ColormapError, Result};

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColormapError::InvalidHex(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ColormapError::InvalidHex(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// `#RRGGBB`, uppercase.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn to_rgba(self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Available continuous color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorScheme {
    /// Black -> Purple -> Orange -> Pale yellow (change magnitude)
    #[default]
    Magma,
    /// Purple -> Teal -> Yellow
    Viridis,
    /// Black -> White
    Grayscale,
    /// Blue -> White -> Red (similarity, divergent data)
    BlueWhiteRed,
}

impl ColorScheme {
    pub const ALL: &[ColorScheme] = &[
        Self::Magma,
        Self::Viridis,
        Self::Grayscale,
        Self::BlueWhiteRed,
    ];

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Magma => "magma",
            Self::Viridis => "viridis",
            Self::Grayscale => "gray",
            Self::BlueWhiteRed => "RdBu_r",
        }
    }

    /// Look a scheme up by its conventional name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "magma" => Ok(Self::Magma),
            "viridis" => Ok(Self::Viridis),
            "gray" | "grey" | "grayscale" | "greys_r" => Ok(Self::Grayscale),
            "rdbu_r" | "bwr" | "blue-white-red" | "bluewhitered" => Ok(Self::BlueWhiteRed),
            _ => Err(ColormapError::UnknownScheme(name.to_string())),
        }
    }
}

// ─── Color stop definitions ───────────────────────────────────────────

const MAGMA_STOPS: &[ColorStop] = &[
    ColorStop::new(0.000, 0, 0, 4),
    ColorStop::new(0.125, 28, 16, 68),
    ColorStop::new(0.250, 79, 18, 123),
    ColorStop::new(0.375, 129, 37, 129),
    ColorStop::new(0.500, 181, 54, 122),
    ColorStop::new(0.625, 229, 80, 100),
    ColorStop::new(0.750, 251, 135, 97),
    ColorStop::new(0.875, 254, 194, 135),
    ColorStop::new(1.000, 252, 253, 191),
];

const VIRIDIS_STOPS: &[ColorStop] = &[
    ColorStop::new(0.000, 68, 1, 84),
    ColorStop::new(0.125, 72, 36, 117),
    ColorStop::new(0.250, 59, 82, 139),
    ColorStop::new(0.375, 44, 114, 142),
    ColorStop::new(0.500, 33, 145, 140),
    ColorStop::new(0.625, 40, 174, 128),
    ColorStop::new(0.750, 94, 201, 98),
    ColorStop::new(0.875, 170, 220, 50),
    ColorStop::new(1.000, 253, 231, 37),
];

const BLUE_WHITE_RED_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 33, 102, 172),
    ColorStop::new(0.25, 103, 169, 207),
    ColorStop::new(0.50, 247, 247, 247),
    ColorStop::new(0.75, 239, 138, 98),
    ColorStop::new(1.00, 178, 24, 43),
];

/// Kelly's 22 colours of maximum contrast, in cluster-id order.
pub const KELLY_COLORS: [&str; 22] = [
    "#F3C300", "#875692", "#F38400", "#A1CAF1", "#BE0032", "#C2B280", "#848482", "#008856",
    "#E68FAC", "#0067A5", "#F99379", "#604E97", "#F6A600", "#B3446C", "#DCD300", "#882D17",
    "#8DB600", "#654522", "#E25822", "#2B3D26", "#F2F3F4", "#222222",
];

/// The first `k` Kelly colours; errors when `k` exceeds the palette.
pub fn kelly_palette(k: usize) -> Result<Vec<Rgb>> {
    if k > KELLY_COLORS.len() {
        return Err(ColormapError::PaletteTooSmall {
            requested: k,
            available: KELLY_COLORS.len(),
        });
    }
    KELLY_COLORS[..k].iter().map(|hex| Rgb::from_hex(hex)).collect()
}

// ─── Interpolation engine ──────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    if t <= 0.0 {
        return stops[0].color;
    }
    if t >= 1.0 {
        return stops[stops.len() - 1].color;
    }
    for i in 1..stops.len() {
        if t <= stops[i].t {
            let ratio = (t - stops[i - 1].t) / (stops[i].t - stops[i - 1].t);
            return lerp_color(stops[i - 1].color, stops[i].color, ratio);
        }
    }
    stops[stops.len() - 1].color
}

/// Evaluate a color scheme at normalized position `t` ∈ [0, 1].
///
/// Values outside the unit interval clamp to the end colours; NaN maps to
/// the low end.
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t };
    match scheme {
        ColorScheme::Magma => multi_stop(MAGMA_STOPS, t),
        ColorScheme::Viridis => multi_stop(VIRIDIS_STOPS, t),
        ColorScheme::Grayscale => {
            let v = (t.clamp(0.0, 1.0) * 255.0).round() as u8;
            Rgb::new(v, v, v)
        }
        ColorScheme::BlueWhiteRed => multi_stop(BLUE_WHITE_RED_STOPS, t),
    }
}
