//! Spherical Web Mercator (`EPSG:3857`) conversions.

use std::f64::consts::PI;

/// Radius of the Web Mercator sphere in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude at which the Web Mercator square ends.
pub const MAX_LAT: f64 = 85.051_128_78;

/// Converts Web Mercator meters to `(longitude, latitude)` in degrees.
#[must_use]
pub fn to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// Converts `(longitude, latitude)` in degrees to Web Mercator meters.
///
/// Latitudes beyond [`MAX_LAT`] are clamped to the edge of the projection.
#[must_use]
pub fn from_lon_lat(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LAT, MAX_LAT);
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_origin() {
        let (x, y) = from_lon_lat(0.0, 0.0);
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn round_trips_within_millimeters() {
        let (x, y) = from_lon_lat(-77.0364, 38.8951);
        let (lon, lat) = to_lon_lat(x, y);
        assert!((lon - -77.0364).abs() < 1e-9);
        assert!((lat - 38.8951).abs() < 1e-9);
    }

    #[test]
    fn clamps_polar_latitudes() {
        let (_, y_pole) = from_lon_lat(0.0, 90.0);
        let (_, y_edge) = from_lon_lat(0.0, MAX_LAT);
        assert!((y_pole - y_edge).abs() < 1e-6);
    }
}
