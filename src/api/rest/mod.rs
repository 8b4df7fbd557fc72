pub mod account;
pub mod driver;
pub mod pickups;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::engine::Phase;
use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .merge(account::router())
        .merge(driver::router())
        .merge(pickups::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .with_state(state)
        .fallback_service(ServeDir::new("static"))
}

/// The signed-in driver, or an error telling the view layer to sign in first.
pub(crate) fn signed_in(state: &AppState) -> Result<User, AppError> {
    state
        .coordinator
        .user()
        .ok_or_else(|| AppError::InvalidState("no driver is signed in".to_string()))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    phase: Phase,
    pending_pickups: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        phase: state.coordinator.phase(),
        pending_pickups: state.coordinator.pending_pickups().len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.coordinator.metrics().encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
