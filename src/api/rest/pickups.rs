use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::rest::signed_in;
use crate::engine::{CardSelectionView, SessionView};
use crate::error::AppError;
use crate::models::pickup::{PickupLocation, PickupRecord};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pickups", get(list_pending))
        .route("/pickups/refresh", post(refresh_pending))
        .route("/pickups/history", get(history))
        .route("/pickups/:id/select", post(select_pickup))
        .route("/selection", get(card_selection).delete(cancel_selection))
        .route("/selection/card", post(choose_card))
        .route("/session/pickup", get(active_session).delete(abandon_session))
        .route("/session/pickup/complete", post(complete_session))
}

/// The card id exactly as the view layer sent it; it is validated by the
/// coordinator, so any JSON value is accepted here.
#[derive(Deserialize)]
pub struct ChooseCardRequest {
    pub card_id: Value,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub pending: usize,
}

async fn list_pending(State(state): State<Arc<AppState>>) -> Json<Vec<PickupLocation>> {
    Json(state.coordinator.pending_pickups())
}

async fn refresh_pending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, AppError> {
    let pending = state.coordinator.refresh_pending().await?;
    Ok(Json(RefreshResponse { pending }))
}

async fn history(State(state): State<Arc<AppState>>) -> Result<Json<Vec<PickupRecord>>, AppError> {
    let user = signed_in(&state)?;
    let records = state.coordinator.pickups().history(user.id).await?;
    Ok(Json(records))
}

async fn select_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CardSelectionView>, AppError> {
    Ok(Json(state.coordinator.select_pickup(&id).await?))
}

async fn card_selection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CardSelectionView>, AppError> {
    state
        .coordinator
        .card_selection()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no pickup is being selected".to_string()))
}

async fn cancel_selection(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    state.coordinator.cancel_selection().await?;
    Ok(Json(serde_json::json!({ "phase": state.coordinator.phase() })))
}

async fn choose_card(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChooseCardRequest>,
) -> Result<Json<SessionView>, AppError> {
    let raw = match &payload.card_id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    Ok(Json(state.coordinator.choose_card(&raw).await?))
}

async fn active_session(State(state): State<Arc<AppState>>) -> Result<Json<SessionView>, AppError> {
    state
        .coordinator
        .session()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no pickup is in progress".to_string()))
}

async fn complete_session(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    state.coordinator.complete().await?;
    Ok(Json(serde_json::json!({ "phase": state.coordinator.phase() })))
}

async fn abandon_session(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    state.coordinator.abandon().await?;
    Ok(Json(serde_json::json!({ "phase": state.coordinator.phase() })))
}
