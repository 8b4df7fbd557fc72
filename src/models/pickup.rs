use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::models::location::GeoPoint;

/// A pending pickup as advertised by the backend, before geocoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPickup {
    #[serde(deserialize_with = "id_as_text")]
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub value: f64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl PendingPickup {
    pub fn coordinates(&self) -> Option<GeoPoint> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupLocation {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub value: f64,
}

impl PickupLocation {
    pub fn from_pending(pending: PendingPickup, point: GeoPoint) -> Self {
        Self {
            id: pending.id,
            lat: point.lat,
            lng: point.lng,
            address: pending.address,
            value: pending.value,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Body shared by the progress, driver-location and complete endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupUpdate {
    pub driver_location: String,
    pub pickup_location: String,
    pub user_id: i64,
    pub driver_id: i64,
    pub card_id: i64,
}

impl PickupUpdate {
    pub fn new(driver_location: String, pickup: &PickupLocation, user_id: i64, card_id: i64) -> Self {
        Self {
            driver_location,
            pickup_location: pickup.address.clone(),
            user_id,
            driver_id: user_id,
            card_id,
        }
    }
}

const UNKNOWN_DISTANCE: &str = "Unknown";
const CALCULATING: &str = "Calculating...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaEstimate {
    pub estimated_time: String,
    #[serde(default = "unknown_distance")]
    pub distance: String,
}

impl EtaEstimate {
    /// Interprets an ETA response body. JSON objects supply whichever fields
    /// they carry; anything else is shown as text.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => Self {
                estimated_time: field_text(&fields, "estimatedTime")
                    .unwrap_or_else(|| CALCULATING.to_string()),
                distance: field_text(&fields, "distance").unwrap_or_else(unknown_distance),
            },
            Ok(Value::String(text)) => Self::plain(&text),
            _ => Self::plain(body),
        }
    }

    fn plain(text: &str) -> Self {
        let estimated_time = if text.is_empty() {
            CALCULATING.to_string()
        } else {
            text.to_string()
        };

        Self {
            estimated_time,
            distance: unknown_distance(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            estimated_time: "Unable to calculate".to_string(),
            distance: unknown_distance(),
        }
    }
}

fn field_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn unknown_distance() -> String {
    UNKNOWN_DISTANCE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupRecord {
    #[serde(default)]
    pub pickup_location: String,
    #[serde(default)]
    pub value: f64,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

fn id_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(i64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(id) => id.to_string(),
        Id::Text(id) => id,
    })
}
