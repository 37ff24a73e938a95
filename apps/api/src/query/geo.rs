use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};

use crate::errors::AppError;

/// Earth's mean radius in miles.
pub const EARTH_RADIUS_MILES: f64 = 3963.0;

/// A "within circle" filter. `radius` is angular (radians).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpatialFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

pub fn to_geo_filter(
    center_lat: f64,
    center_lon: f64,
    radius_miles: f64,
) -> Result<SpatialFilter, AppError> {
    if !(-90.0..=90.0).contains(&center_lat) {
        return Err(AppError::InvalidQuery(format!(
            "latitude {center_lat} is out of range"
        )));
    }
    if !(-180.0..=180.0).contains(&center_lon) {
        return Err(AppError::InvalidQuery(format!(
            "longitude {center_lon} is out of range"
        )));
    }
    if !radius_miles.is_finite() || radius_miles < 0.0 {
        return Err(AppError::InvalidQuery(format!(
            "distance must be a non-negative number, got {radius_miles}"
        )));
    }

    Ok(SpatialFilter {
        latitude: center_lat,
        longitude: center_lon,
        radius: radius_miles / EARTH_RADIUS_MILES,
    })
}

impl SpatialFilter {
    /// Great-circle angle between the center and a point, in radians.
    pub fn angular_distance(&self, lat: f64, lon: f64) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (lon - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * a.sqrt().min(1.0).asin()
    }

    #[cfg(test)]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.angular_distance(lat, lon) <= self.radius
    }

    /// Pushes the haversine predicate over the given coordinate columns.
    pub fn push_predicate(
        &self,
        qb: &mut QueryBuilder<'static, Postgres>,
        lat_column: &str,
        lon_column: &str,
    ) {
        qb.push("2 * asin(least(1.0, sqrt(power(sin((radians(");
        qb.push(lat_column);
        qb.push(") - radians(");
        qb.push_bind(self.latitude);
        qb.push(")) / 2), 2) + cos(radians(");
        qb.push_bind(self.latitude);
        qb.push(")) * cos(radians(");
        qb.push(lat_column);
        qb.push(")) * power(sin((radians(");
        qb.push(lon_column);
        qb.push(") - radians(");
        qb.push_bind(self.longitude);
        qb.push(")) / 2), 2)))) <= ");
        qb.push_bind(self.radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_is_distance_over_earth_radius() {
        let filter = to_geo_filter(42.36, -71.06, 10.0).unwrap();
        assert!((filter.radius - 10.0 / 3963.0).abs() < 1e-12);
        assert_eq!(filter.latitude, 42.36);
        assert_eq!(filter.longitude, -71.06);
    }

    #[test]
    fn test_zero_radius_is_allowed() {
        let filter = to_geo_filter(0.0, 0.0, 0.0).unwrap();
        assert_eq!(filter.radius, 0.0);
        assert!(filter.contains(0.0, 0.0));
    }

    #[test]
    fn test_out_of_range_inputs_are_invalid() {
        assert!(matches!(to_geo_filter(91.0, 0.0, 1.0), Err(AppError::InvalidQuery(_))));
        assert!(matches!(to_geo_filter(0.0, -181.0, 1.0), Err(AppError::InvalidQuery(_))));
        assert!(matches!(to_geo_filter(0.0, 0.0, -5.0), Err(AppError::InvalidQuery(_))));
        assert!(matches!(
            to_geo_filter(0.0, 0.0, f64::NAN),
            Err(AppError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_contains_uses_great_circle_distance() {
        // Boston -> Cambridge is ~3 miles; Boston -> New York is ~190 miles.
        let boston = to_geo_filter(42.3601, -71.0589, 10.0).unwrap();
        assert!(boston.contains(42.3736, -71.1097));
        assert!(!boston.contains(40.7128, -74.0060));
    }

    #[test]
    fn test_predicate_binds_center_and_radius() {
        let filter = to_geo_filter(42.0, -71.0, 25.0).unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM jobs WHERE ");
        filter.push_predicate(&mut qb, "latitude", "longitude");
        let sql = qb.sql();
        assert!(sql.contains("radians(latitude)"));
        assert!(sql.contains("radians(longitude)"));
        assert!(sql.ends_with("<= $4"));
    }
}
