use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::location::GeoPoint;

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Forward and reverse geocoding. Failures are expected and always recoverable.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, address: &str) -> Result<GeoPoint, AppError>;

    async fn describe(&self, point: GeoPoint) -> Result<String, AppError>;
}

pub async fn locate_or_fallback(geocoder: &dyn Geocoder, address: &str) -> GeoPoint {
    match geocoder.locate(address).await {
        Ok(point) => point,
        Err(err) => {
            warn!(address, error = %err, "geocoding failed; using fallback coordinate");
            GeoPoint::FALLBACK
        }
    }
}

pub async fn describe_or_coordinates(geocoder: &dyn Geocoder, point: GeoPoint) -> String {
    match geocoder.describe(point).await {
        Ok(address) => address,
        Err(err) => {
            warn!(lat = point.lat, lng = point.lng, error = %err, "reverse geocoding failed");
            point.to_coordinate_text()
        }
    }
}

pub struct GoogleGeocoder {
    client: reqwest::Client,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    async fn first_result(&self, query: &[(&str, &str)]) -> Result<GeocodeResult, AppError> {
        let response: GeocodeResponse = self
            .client
            .get(GOOGLE_GEOCODE_URL)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "OK" {
            return Err(AppError::Geocoding(format!("status {}", response.status)));
        }

        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Geocoding("no results".to_string()))
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn locate(&self, address: &str) -> Result<GeoPoint, AppError> {
        let result = self.first_result(&[("address", address)]).await?;
        let location = result.geometry.location;
        debug!(address, lat = location.lat, lng = location.lng, "address geocoded");
        Ok(location)
    }

    async fn describe(&self, point: GeoPoint) -> Result<String, AppError> {
        let latlng = format!("{},{}", point.lat, point.lng);
        let result = self.first_result(&[("latlng", latlng.as_str())]).await?;
        debug!(lat = point.lat, lng = point.lng, address = %result.formatted_address, "coordinates reverse geocoded");
        Ok(result.formatted_address)
    }
}

/// Stand-in when no maps API key is configured; every lookup takes the fallback path.
pub struct DisabledGeocoder;

#[async_trait]
impl Geocoder for DisabledGeocoder {
    async fn locate(&self, _address: &str) -> Result<GeoPoint, AppError> {
        Err(AppError::Geocoding("geocoding is not configured".to_string()))
    }

    async fn describe(&self, _point: GeoPoint) -> Result<String, AppError> {
        Err(AppError::Geocoding("geocoding is not configured".to_string()))
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: GeoPoint,
}

#[cfg(test)]
mod tests {
    use super::{describe_or_coordinates, locate_or_fallback, DisabledGeocoder};
    use crate::models::location::GeoPoint;

    #[tokio::test]
    async fn failures_degrade_to_fallbacks() {
        let geocoder = DisabledGeocoder;

        let point = locate_or_fallback(&geocoder, "1 Nowhere Lane").await;
        assert_eq!(point, GeoPoint::FALLBACK);

        let text = describe_or_coordinates(&geocoder, GeoPoint { lat: 1.5, lng: -2.25 }).await;
        assert_eq!(text, "1.500000, -2.250000");
    }
}
