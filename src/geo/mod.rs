const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Assumed courier speed for ETA estimates when no live speed is known.
pub const DEFAULT_AVG_SPEED_KMH: f64 = 30.0;

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lon = (delta_lon / 2.0).sin();

    let haversine = sin_lat * sin_lat + phi1.cos() * phi2.cos() * sin_lon * sin_lon;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Total length of a polyline of (lat, lon) points, in order.
pub fn path_distance_km(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0].0, pair[0].1, pair[1].0, pair[1].1))
        .sum()
}

/// Estimated minutes to cover a distance at an average speed. Zero or
/// negative inputs estimate 0.
pub fn estimate_eta_minutes(distance_km: f64, avg_speed_kmh: f64) -> u64 {
    if distance_km <= 0.0 || avg_speed_kmh <= 0.0 {
        return 0;
    }
    (distance_km / avg_speed_kmh * 60.0).round() as u64
}

/// Parses a `"lat, lon"` string into coordinates. Returns `None` for
/// anything that is not two comma-separated numbers within valid bounds.
pub fn parse_coordinates(raw: &str) -> Option<(f64, f64)> {
    let (lat, lon) = raw.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some((lat, lon))
}
