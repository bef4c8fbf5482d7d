//! Geographic coordinates.

use std::fmt;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoCoord {
    /// Latitude, positive north.
    pub lat: f64,
    /// Longitude, positive east.
    pub lon: f64,
}

impl GeoCoord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Component-wise minimum of two coordinates.
    pub fn min(self, other: GeoCoord) -> GeoCoord {
        GeoCoord::new(self.lat.min(other.lat), self.lon.min(other.lon))
    }

    /// Component-wise maximum of two coordinates.
    pub fn max(self, other: GeoCoord) -> GeoCoord {
        GeoCoord::new(self.lat.max(other.lat), self.lon.max(other.lon))
    }

    /// Returns `true` when both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl From<(f64, f64)> for GeoCoord {
    /// Builds a coordinate from a `(lat, lon)` pair.
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max() {
        let a = GeoCoord::new(10.0, 20.0);
        let b = GeoCoord::new(15.0, -5.0);
        assert_eq!(a.min(b), GeoCoord::new(10.0, -5.0));
        assert_eq!(a.max(b), GeoCoord::new(15.0, 20.0));
    }

    #[test]
    fn test_from_tuple_is_lat_lon() {
        let c: GeoCoord = (35.5, 138.7).into();
        assert_eq!(c.lat, 35.5);
        assert_eq!(c.lon, 138.7);
    }

    #[test]
    fn test_is_finite() {
        assert!(GeoCoord::new(1.0, 2.0).is_finite());
        assert!(!GeoCoord::new(f64::NAN, 2.0).is_finite());
    }
}
