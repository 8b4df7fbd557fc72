use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::engine::PositionOutcome;
use crate::error::{AppError, GeolocationError};
use crate::models::location::GeoPoint;
use crate::state::{AppState, GeolocationOptions};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/driver/location", get(current_location).put(report_position))
        .route("/driver/center", post(center_on_driver))
        .route("/driver/geolocation-options", get(geolocation_options))
}

/// One platform geolocation callback: either a fix or the failure reason.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PositionReport {
    Fix(GeoPoint),
    Failure { error: GeolocationError },
}

#[derive(Serialize)]
pub struct PositionResponse {
    pub outcome: PositionOutcome,
    pub location: Option<GeoPoint>,
}

async fn report_position(
    State(state): State<Arc<AppState>>,
    Json(report): Json<PositionReport>,
) -> Result<Json<PositionResponse>, AppError> {
    let fix = match report {
        PositionReport::Fix(point) => {
            if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lng) {
                return Err(AppError::Validation(format!(
                    "({}, {}) is not a valid coordinate",
                    point.lat, point.lng
                )));
            }
            Ok(point)
        }
        PositionReport::Failure { error } => Err(error),
    };

    let outcome = state.coordinator.on_position(fix).await;
    Ok(Json(PositionResponse {
        outcome,
        location: state.coordinator.current_location(),
    }))
}

async fn current_location(State(state): State<Arc<AppState>>) -> Json<Option<GeoPoint>> {
    Json(state.coordinator.current_location())
}

async fn center_on_driver(State(state): State<Arc<AppState>>) -> Result<Json<GeoPoint>, AppError> {
    Ok(Json(state.coordinator.center_on_driver()?))
}

async fn geolocation_options(State(state): State<Arc<AppState>>) -> Json<GeolocationOptions> {
    Json(state.geolocation)
}
