// src/utils/geo.rs

//! Great-circle distance on a spherical Earth.

use crate::models::GeoPoint;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // clamp guards asin against h drifting just above 1.0
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Haversine distance rounded to the nearest whole kilometre.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> u64 {
    haversine_km(a, b).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        let p = GeoPoint::new(34.05, -118.25);
        assert_eq!(distance_km(p, p), 0);
    }

    #[test]
    fn one_degree_latitude_at_equator() {
        let d = haversine_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.5, "got {d}");
        assert_eq!(distance_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0)), 111);
    }

    #[test]
    fn symmetric() {
        let la = GeoPoint::new(34.05, -118.25);
        let sf = GeoPoint::new(37.77, -122.42);
        assert_eq!(haversine_km(la, sf), haversine_km(sf, la));
        assert_eq!(distance_km(la, sf), 559);
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = haversine_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }
}
