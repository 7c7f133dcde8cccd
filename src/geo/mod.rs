use serde::{Deserialize, Serialize};

use crate::error::AppError;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Flat coordinate pair as submitted by driver devices and stored on
/// delivery sessions. Wire names match the persisted schema.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// GeoJSON `Point` kept alongside the flat pair for spatial indexing.
/// Derived from the flat pair at write time, never submitted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonPoint {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]` per GeoJSON convention.
    pub coordinates: [f64; 2],
}

impl GeoJsonPoint {
    pub fn from_point(point: &GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [point.longitude, point.latitude],
        }
    }
}

pub fn validate_coordinates(point: &GeoPoint) -> Result<(), AppError> {
    if !point.latitude.is_finite() || !(-90.0..=90.0).contains(&point.latitude) {
        return Err(AppError::Validation(format!(
            "latitude {} out of range [-90, 90]",
            point.latitude
        )));
    }

    if !point.longitude.is_finite() || !(-180.0..=180.0).contains(&point.longitude) {
        return Err(AppError::Validation(format!(
            "longitude {} out of range [-180, 180]",
            point.longitude
        )));
    }

    Ok(())
}

pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_M * central_angle
}

#[cfg(test)]
mod tests {
    use super::{haversine_m, validate_coordinates, GeoJsonPoint, GeoPoint};

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            latitude: 53.5511,
            longitude: 9.9937,
        };
        let distance = haversine_m(&p, &p);
        assert!(distance < 1e-6);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            latitude: 51.5074,
            longitude: -0.1278,
        };
        let paris = GeoPoint {
            latitude: 48.8566,
            longitude: 2.3522,
        };
        let distance = haversine_m(&london, &paris);
        assert!((distance - 343_000.0).abs() < 5_000.0);
    }

    #[test]
    fn boundary_coordinates_are_valid() {
        let edge = GeoPoint {
            latitude: 90.0,
            longitude: -180.0,
        };
        assert!(validate_coordinates(&edge).is_ok());
    }

    #[test]
    fn latitude_just_over_range_is_rejected() {
        let over = GeoPoint {
            latitude: 90.0001,
            longitude: 0.0,
        };
        assert!(validate_coordinates(&over).is_err());
    }

    #[test]
    fn longitude_out_of_range_is_rejected() {
        let over = GeoPoint {
            latitude: 0.0,
            longitude: 180.5,
        };
        assert!(validate_coordinates(&over).is_err());
    }

    #[test]
    fn geojson_point_swaps_to_lon_lat_order() {
        let p = GeoPoint {
            latitude: 40.7580,
            longitude: -73.9855,
        };
        let geo = GeoJsonPoint::from_point(&p);
        assert_eq!(geo.kind, "Point");
        assert_eq!(geo.coordinates, [-73.9855, 40.7580]);
    }
}
