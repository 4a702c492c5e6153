use crate::models::order::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Straight-line distance stretched by `road_factor`, to one decimal place.
pub fn road_estimate_km(a: &GeoPoint, b: &GeoPoint, road_factor: f64) -> f64 {
    let km = haversine_km(a, b) * road_factor;
    (km * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, road_estimate_km};
    use crate::models::order::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let palace = GeoPoint {
            lat: 21.9588,
            lng: 96.0891,
        };
        assert!(haversine_km(&palace, &palace) < 1e-9);
    }

    #[test]
    fn mandalay_to_yangon_is_around_570_km() {
        let mandalay = GeoPoint {
            lat: 21.9588,
            lng: 96.0891,
        };
        let yangon = GeoPoint {
            lat: 16.8409,
            lng: 96.1735,
        };
        let distance = haversine_km(&mandalay, &yangon);
        assert!((distance - 569.0).abs() < 10.0);
    }

    #[test]
    fn road_estimate_is_stretched_and_rounded() {
        let zegyo = GeoPoint {
            lat: 21.9810,
            lng: 96.0836,
        };
        let airport = GeoPoint {
            lat: 21.7022,
            lng: 95.9779,
        };
        let straight = haversine_km(&zegyo, &airport);
        let road = road_estimate_km(&zegyo, &airport, 1.3);

        assert!(road > straight);
        assert!((road - straight * 1.3).abs() <= 0.05);
        assert_eq!(road, (road * 10.0).round() / 10.0);
    }
}
