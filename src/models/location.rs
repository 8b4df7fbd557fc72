use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Substituted for any pickup address the geocoder cannot resolve.
    pub const FALLBACK: GeoPoint = GeoPoint {
        lat: 37.7849,
        lng: -122.4084,
    };

    /// `"lat, lng"` at six decimals; the textual form used whenever an address is unavailable.
    pub fn to_coordinate_text(&self) -> String {
        format!("{:.6}, {:.6}", self.lat, self.lng)
    }
}
