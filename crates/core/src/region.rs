//! Rectangular area of interest in geographic coordinates

use crate::error::{Error, Result};
use geo_types::{polygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Axis-aligned bounding box in WGS84 longitude/latitude.
///
/// Constructed through [`create_region`] (or [`Region::new`]), which rejects
/// empty or inverted boxes; immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

/// Build a region from bounding box coordinates.
///
/// Fails when any coordinate is non-finite or out of the lon/lat range, or
/// when `xmin >= xmax` or `ymin >= ymax`.
pub fn create_region(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Region> {
    Region::new(xmin, ymin, xmax, ymax)
}

impl Region {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRegion {
            xmin,
            ymin,
            xmax,
            ymax,
            reason: reason.to_string(),
        };

        if ![xmin, ymin, xmax, ymax].iter().all(|v| v.is_finite()) {
            return Err(invalid("coordinates must be finite"));
        }
        if xmin >= xmax {
            return Err(invalid("xmin must be less than xmax"));
        }
        if ymin >= ymax {
            return Err(invalid("ymin must be less than ymax"));
        }
        if xmin < -180.0 || xmax > 180.0 {
            return Err(invalid("longitude outside [-180, 180]"));
        }
        if ymin < -90.0 || ymax > 90.0 {
            return Err(invalid("latitude outside [-90, 90]"));
        }

        Ok(Self {
            min_x: xmin,
            min_y: ymin,
            max_x: xmax,
            max_y: ymax,
        })
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Bounds as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Width in degrees of longitude
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height in degrees of latitude
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Centre as (lon, lat)
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Whether a point lies inside the box (edges included)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Whether two regions share any area
    pub fn intersects(&self, other: &Region) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Closed polygon ring: (xmin,ymin) → (xmin,ymax) → (xmax,ymax) → (xmax,ymin)
    pub fn polygon(&self) -> Polygon<f64> {
        polygon![
            (x: self.min_x, y: self.min_y),
            (x: self.min_x, y: self.max_y),
            (x: self.max_x, y: self.max_y),
            (x: self.max_x, y: self.min_y),
        ]
    }

    /// GeoJSON `Polygon` geometry for service queries
    pub fn to_geojson(&self) -> Value {
        let ring: Vec<[f64; 2]> = self
            .polygon()
            .exterior()
            .coords()
            .map(|c| [c.x, c.y])
            .collect();
        json!({
            "type": "Polygon",
            "coordinates": [ring],
        })
    }
}
