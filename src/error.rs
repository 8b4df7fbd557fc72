use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable")]
    Unavailable,

    #[error("location request timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("malformed data: {0}")]
    Format(String),

    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Geolocation(#[from] GeolocationError),

    #[error("geocoding failed: {0}")]
    Geocoding(String),

    #[error("not allowed right now: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// What the driver can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "correct the input and try again",
            AppError::Format(_) => "the stored data is unreadable; upload it again",
            AppError::Network(_) => "check your connection and retry",
            AppError::Geolocation(_) => "enable location access and wait for a GPS fix",
            AppError::Geocoding(_) => "retry in a moment",
            AppError::InvalidState(_) => "refresh the screen and retry",
            AppError::NotFound(_) => "refresh the list and pick again",
            AppError::Internal(_) => "retry; restart the app if it keeps happening",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Network(_) | AppError::Geocoding(_) => StatusCode::BAD_GATEWAY,
            AppError::Geolocation(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "hint": self.hint(),
        }));

        (status, body).into_response()
    }
}
