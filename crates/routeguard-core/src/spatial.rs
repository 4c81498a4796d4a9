//! Spherical geometry helpers shared by the validator, router and guidance.

use crate::models::Coordinate;

/// Mean Earth radius used by every distance calculation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters using the Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance between two coordinates in meters.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Sum of great-circle distances over consecutive points.
pub fn path_length_m(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_m(pair[0], pair[1]))
        .sum()
}

/// Initial bearing from `a` to `b` in degrees, 0 = north, clockwise, in [0, 360).
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    let degrees = x.atan2(y).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

/// Signed change of heading from `from_deg` to `to_deg`, normalised to (-180, 180].
///
/// Positive values turn clockwise (right), negative values counter-clockwise.
pub fn angle_difference(from_deg: f64, to_deg: f64) -> f64 {
    let mut delta = (to_deg - from_deg).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    delta
}

/// Linear interpolation in both axes. Good enough below ~50 km.
pub fn interpolate(a: Coordinate, b: Coordinate, fraction: f64) -> Coordinate {
    Coordinate {
        latitude: a.latitude + (b.latitude - a.latitude) * fraction,
        longitude: a.longitude + (b.longitude - a.longitude) * fraction,
    }
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Convert a north/south offset in meters to degrees latitude.
pub fn meters_to_lat(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / meters_per_deg_lat(ref_lat_deg).max(1e-9)
}

/// Convert an east/west offset in meters to degrees longitude.
pub fn meters_to_lon(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / meters_per_deg_lon(ref_lat_deg).max(1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // ~111km between these points (1 degree latitude)
        let dist = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 111_194.0).abs() < 100.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = distance_m(coord(53.5142, 8.1428), coord(53.5142, 8.1428));
        assert!(dist < 0.001);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = coord(0.0, 0.0);
        assert!(bearing_degrees(origin, coord(1.0, 0.0)).abs() < 1e-9);
        assert!((bearing_degrees(origin, coord(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, coord(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, coord(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn bearing_stays_in_range() {
        let b = bearing_degrees(coord(10.0, 10.0), coord(10.0001, 9.9999));
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn angle_difference_wraps() {
        assert_eq!(angle_difference(350.0, 10.0), 20.0);
        assert_eq!(angle_difference(10.0, 350.0), -20.0);
        assert_eq!(angle_difference(0.0, 180.0), 180.0);
        assert_eq!(angle_difference(90.0, 270.0), 180.0);
        assert_eq!(angle_difference(45.0, 45.0), 0.0);
    }

    #[test]
    fn interpolate_midpoint() {
        let mid = interpolate(coord(10.0, 20.0), coord(12.0, 24.0), 0.5);
        assert_eq!(mid, coord(11.0, 22.0));
    }

    #[test]
    fn path_length_sums_segments() {
        let points = [coord(0.0, 0.0), coord(0.0, 0.01), coord(0.01, 0.01)];
        let expected = distance_m(points[0], points[1]) + distance_m(points[1], points[2]);
        assert!((path_length_m(&points) - expected).abs() < 1e-9);
        assert_eq!(path_length_m(&points[..1]), 0.0);
    }

    #[test]
    fn meters_to_degrees_round_trip() {
        let lat = 53.5;
        let deg = meters_to_lat(100.0, lat);
        assert!((deg * meters_per_deg_lat(lat) - 100.0).abs() < 1e-6);
        let deg = meters_to_lon(100.0, lat);
        assert!((deg * meters_per_deg_lon(lat) - 100.0).abs() < 1e-6);
    }
}
