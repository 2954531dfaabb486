// src/pipeline/filter.rs

//! Region and magnitude admission.

use crate::models::{RegionBounds, SeismicEvent};

/// Whether `event` lies inside `bounds` and reaches `min_magnitude`.
///
/// A missing magnitude counts as negative infinity. Bounds that cross the
/// antimeridian admit nothing.
pub fn admit(event: &SeismicEvent, bounds: &RegionBounds, min_magnitude: f64) -> bool {
    let magnitude = event.magnitude.unwrap_or(f64::NEG_INFINITY);
    bounds.contains(event.latitude, event.longitude) && magnitude >= min_magnitude
}

/// Magnitude from which an alert is flagged as significant.
pub const SIGNIFICANT_MAGNITUDE: f64 = 4.0;

/// Whether `event` reaches [`SIGNIFICANT_MAGNITUDE`].
pub fn is_significant(event: &SeismicEvent) -> bool {
    event.magnitude.is_some_and(|m| m >= SIGNIFICANT_MAGNITUDE)
}

/// Configured admission predicate.
#[derive(Debug, Clone, Copy)]
pub struct GeoFilter {
    bounds: RegionBounds,
    min_magnitude: f64,
}

impl GeoFilter {
    pub fn new(bounds: RegionBounds, min_magnitude: f64) -> Self {
        Self {
            bounds,
            min_magnitude,
        }
    }

    pub fn admit(&self, event: &SeismicEvent) -> bool {
        admit(event, &self.bounds, self.min_magnitude)
    }

    pub fn bounds(&self) -> &RegionBounds {
        &self.bounds
    }

    pub fn min_magnitude(&self) -> f64 {
        self.min_magnitude
    }
}
