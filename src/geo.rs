//! Geographic primitives: coordinate value type, great-circle distance,
//! and the pure proximity matcher used for alert fan-out.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::alerts::error::AlertError;

/// Mean Earth radius in kilometers, per the haversine convention.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius used when fanning out a freshly created alert to tracked users.
/// Matches the default radius of the REST nearby query.
pub const NOTIFY_RADIUS_KM: f64 = 10.0;

/// An immutable latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting coordinates outside the valid ranges
    /// (latitude [-90, 90], longitude [-180, 180]) or non-finite values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AlertError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AlertError::InvalidInput(format!(
                "latitude out of range: {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AlertError::InvalidInput(format!(
                "longitude out of range: {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Haversine great-circle distance between two points, in kilometers.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_delta = (b.latitude - a.latitude).to_radians();
    let lon_delta = (b.longitude - a.longitude).to_radians();

    let h = (lat_delta / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (lon_delta / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Pure proximity match over a snapshot of tracked identities: returns every
/// identity whose position lies within `radius_km` of `center`.
pub fn find_nearby<'a, I>(tracked: I, center: GeoPoint, radius_km: f64) -> HashSet<String>
where
    I: IntoIterator<Item = (&'a str, GeoPoint)>,
{
    tracked
        .into_iter()
        .filter(|(_, position)| distance_km(*position, center) <= radius_km)
        .map(|(identity, _)| identity.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nyc() -> GeoPoint {
        GeoPoint::new(40.7128, -74.0060).unwrap()
    }

    fn la() -> GeoPoint {
        GeoPoint::new(34.0522, -118.2437).unwrap()
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(distance_km(nyc(), nyc()), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let there = distance_km(nyc(), la());
        let back = distance_km(la(), nyc());
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn nyc_to_la_is_about_3940_km() {
        let d = distance_km(nyc(), la());
        assert!(d > 3900.0 && d < 4100.0, "got {d} km");
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(0.0, 180.0).unwrap();
        let d = distance_km(a, b);
        // Half of 2*pi*R.
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1.0);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(GeoPoint::new(90.1, 0.0).is_err());
        assert!(GeoPoint::new(-91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn find_nearby_filters_by_radius() {
        let tracked = vec![("alice", nyc()), ("bob", la())];
        let hits = find_nearby(tracked.iter().map(|(k, v)| (*k, *v)), nyc(), 1.0);
        assert!(hits.contains("alice"));
        assert!(!hits.contains("bob"));
    }

    #[test]
    fn find_nearby_is_monotonic_in_radius() {
        let tracked = vec![("alice", nyc()), ("bob", la())];
        let small = find_nearby(tracked.iter().map(|(k, v)| (*k, *v)), nyc(), 1.0);
        let large = find_nearby(tracked.iter().map(|(k, v)| (*k, *v)), nyc(), 5000.0);
        assert!(small.is_subset(&large));
        assert!(large.contains("bob"));
    }

    #[test]
    fn find_nearby_on_empty_snapshot_is_empty() {
        let hits = find_nearby(std::iter::empty(), nyc(), 100.0);
        assert!(hits.is_empty());
    }
}
