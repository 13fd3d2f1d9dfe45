//! Great-circle distance between captured coordinates.

use crate::types::Coordinate;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters.
///
/// Symmetric and zero for identical points. Latitude/longitude outside
/// [-90, 90] / [-180, 180] are not rejected: the formula stays defined and the
/// caller owns validation of provider output.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Distance when it does not exceed `max_meters`.
pub fn within(a: &Coordinate, b: &Coordinate, max_meters: f64) -> Option<f64> {
    let d = distance(a, b);
    (d <= max_meters).then_some(d)
}
