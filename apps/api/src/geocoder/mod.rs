//! Geocoder: resolves addresses and postal codes to coordinates.
//!
//! Handlers depend on the `Geocoder` trait; the production backend is the
//! MapQuest geocoding API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<GeocodeError> for AppError {
    fn from(e: GeocodeError) -> Self {
        AppError::UpstreamUnavailable(format!("geocoder: {e}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Returns `Ok(None)` when the service answers but finds nothing.
    async fn geocode(&self, query: &str) -> Result<Option<GeoLocation>, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct MapQuestResponse {
    #[serde(default)]
    results: Vec<MapQuestResult>,
}

#[derive(Debug, Deserialize)]
struct MapQuestResult {
    #[serde(default)]
    locations: Vec<MapQuestLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapQuestLocation {
    lat_lng: LatLng,
    #[serde(default)]
    street: String,
    /// City.
    #[serde(default)]
    admin_area5: String,
    /// State.
    #[serde(default)]
    admin_area3: String,
    #[serde(default)]
    postal_code: String,
    /// Country.
    #[serde(default)]
    admin_area1: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<MapQuestLocation> for GeoLocation {
    fn from(loc: MapQuestLocation) -> Self {
        let formatted_address = [
            loc.street.as_str(),
            loc.admin_area5.as_str(),
            loc.admin_area3.as_str(),
            loc.postal_code.as_str(),
            loc.admin_area1.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ");

        GeoLocation {
            latitude: loc.lat_lng.lat,
            longitude: loc.lat_lng.lng,
            formatted_address,
            city: loc.admin_area5,
            state: loc.admin_area3,
            zipcode: loc.postal_code,
            country: loc.admin_area1,
        }
    }
}

fn first_location(response: MapQuestResponse) -> Option<GeoLocation> {
    response
        .results
        .into_iter()
        .flat_map(|r| r.locations)
        .next()
        .map(GeoLocation::from)
}

#[derive(Clone)]
pub struct MapQuestGeocoder {
    client: Client,
    api_key: String,
    base_url: String,
}

impl MapQuestGeocoder {
    pub fn new(api_key: String, base_url: String) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for MapQuestGeocoder {
    /// Retries on 429 and 5xx with exponential backoff.
    async fn geocode(&self, query: &str) -> Result<Option<GeoLocation>, GeocodeError> {
        let url = format!("{}/geocoding/v1/address", self.base_url);
        let mut last_error: Option<GeocodeError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 250ms, 500ms
                let delay = std::time::Duration::from_millis(250 * (1 << (attempt - 1)));
                warn!(
                    "Geocode attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .get(&url)
                .query(&[("key", self.api_key.as_str()), ("location", query)])
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(GeocodeError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Geocoder returned {}: {}", status, body);
                last_error = Some(GeocodeError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GeocodeError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let parsed: MapQuestResponse = response.json().await?;
            let location = first_location(parsed);
            debug!("Geocoded '{query}': {:?}", location.as_ref().map(|l| (l.latitude, l.longitude)));
            return Ok(location);
        }

        Err(last_error.unwrap_or(GeocodeError::Api {
            status: 503,
            message: "geocoder retries exhausted".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "info": {"statuscode": 0},
        "results": [{
            "providedLocation": {"location": "02108"},
            "locations": [{
                "street": "",
                "adminArea5": "Boston",
                "adminArea3": "MA",
                "adminArea1": "US",
                "postalCode": "02108",
                "latLng": {"lat": 42.35769, "lng": -71.06296}
            }]
        }]
    }"#;

    #[test]
    fn test_first_location_parses_mapquest_payload() {
        let response: MapQuestResponse = serde_json::from_str(SAMPLE).unwrap();
        let loc = first_location(response).unwrap();
        assert_eq!(loc.latitude, 42.35769);
        assert_eq!(loc.longitude, -71.06296);
        assert_eq!(loc.city, "Boston");
        assert_eq!(loc.zipcode, "02108");
        assert_eq!(loc.formatted_address, "Boston, MA, 02108, US");
    }

    #[test]
    fn test_empty_results_yield_none() {
        let response: MapQuestResponse =
            serde_json::from_str(r#"{"results": [{"locations": []}]}"#).unwrap();
        assert!(first_location(response).is_none());

        let response: MapQuestResponse = serde_json::from_str("{}").unwrap();
        assert!(first_location(response).is_none());
    }

    #[test]
    fn test_geocode_error_maps_to_upstream_unavailable() {
        let err: AppError = GeocodeError::Api {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }
}
