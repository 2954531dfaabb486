//! Geographic primitives.

use serde::{Deserialize, Serialize};

/// A point on the WGS84 globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Inclusive latitude/longitude rectangle.
///
/// Boxes crossing the antimeridian (`min_longitude > max_longitude`) are not
/// supported and contain no points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl RegionBounds {
    pub fn new(min_latitude: f64, max_latitude: f64, min_longitude: f64, max_longitude: f64) -> Self {
        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    /// Whether the box wraps across the 180th meridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_longitude > self.max_longitude
    }

    /// Inclusive containment test. NaN coordinates are never contained.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.min_latitude <= latitude
            && latitude <= self.max_latitude
            && self.min_longitude <= longitude
            && longitude <= self.max_longitude
    }

    /// Midpoint of the box.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_latitude + self.max_latitude) / 2.0,
            (self.min_longitude + self.max_longitude) / 2.0,
        )
    }
}
