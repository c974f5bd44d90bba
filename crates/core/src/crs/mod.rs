//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Metres per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Pixel size in degrees `(x, y)` for a ground distance in metres at `lat`.
pub fn degrees_for_meters(meters: f64, lat: f64) -> (f64, f64) {
    let lat_factor = lat.to_radians().cos().max(1e-6);
    let dy = meters / METERS_PER_DEGREE;
    (dy / lat_factor, dy)
}

/// Coordinate Reference System, identified by its EPSG code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// Parse an `EPSG:<code>` identifier as used by the Earth Engine grid API
    pub fn from_code(code: &str) -> Option<Self> {
        let (authority, number) = code.split_once(':')?;
        if !authority.eq_ignore_ascii_case("epsg") {
            return None;
        }
        number.trim().parse().ok().map(Self::from_epsg)
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Whether this is a geographic (lon/lat) CRS
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, 4326 | 4269 | 4258)
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self.epsg == other.epsg
    }

    /// `EPSG:<code>`
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_epsg_codes() {
        assert_eq!(CRS::from_code("EPSG:4326"), Some(CRS::wgs84()));
        assert_eq!(CRS::from_code("epsg:32633").map(|c| c.epsg()), Some(32633));
        assert!(CRS::from_code("SR-ORG:6974").is_none());
        assert!(CRS::from_code("4326").is_none());
    }

    #[test]
    fn equivalence_and_identifier() {
        let a = CRS::from_epsg(4326);
        assert!(a.is_equivalent(&CRS::wgs84()));
        assert!(a.is_geographic());
        assert_eq!(a.identifier(), "EPSG:4326");
        assert!(!CRS::from_epsg(3857).is_equivalent(&a));
    }

    #[test]
    fn degree_pixels_widen_with_latitude() {
        let (x0, y0) = degrees_for_meters(10.0, 0.0);
        assert!((x0 - y0).abs() < 1e-15);
        let (x60, y60) = degrees_for_meters(10.0, 60.0);
        assert_eq!(y60, y0);
        assert!((x60 / y60 - 2.0).abs() < 1e-9);
    }
}
