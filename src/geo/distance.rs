use super::types::Point;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters, via the haversine formula.
pub fn haversine_meters(from: &Point, to: &Point) -> f64 {
    let lat1 = from.latitude_degrees().to_radians();
    let lat2 = to.latitude_degrees().to_radians();
    let delta_lat = lat2 - lat1;
    let delta_lon = (to.longitude_degrees() - from.longitude_degrees()).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}
