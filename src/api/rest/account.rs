use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::rest::signed_in;
use crate::codec::picture::resolve_profile_picture;
use crate::codec::raster::{encode_upload, MAX_ENCODED_UPLOAD_BYTES};
use crate::error::AppError;
use crate::models::user::{ConfirmationLink, IdentityClaims, ProfilePictureUpload, Registration, User};
use crate::state::AppState;

/// Room for the base64 payload plus the JSON around it.
const UPLOAD_BODY_LIMIT: usize = MAX_ENCODED_UPLOAD_BYTES + 4 * 1024;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", post(start_session).delete(end_session))
        .route("/register", post(register))
        .route("/account", get(account))
        .route(
            "/account/connected",
            get(connected_account).post(create_connected_account),
        )
        .route(
            "/profile/picture",
            post(upload_profile_picture).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/backend/ping", get(ping_backend))
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStart {
    SignedIn {
        user: User,
    },
    RegistrationRequired {
        email: String,
        first_name: String,
        last_name: String,
    },
}

#[derive(Deserialize)]
pub struct PictureUploadRequest {
    pub content_type: String,
    /// Base64 of the raw file bytes.
    pub data: String,
}

#[derive(Serialize)]
pub struct PictureUploadResponse {
    pub preview: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize)]
pub struct ConnectedAccountResponse {
    pub account: String,
    pub onboarding_url: Option<String>,
}

/// Looks the driver up by email and signs them in when registered.
async fn sign_in(state: &AppState, claims: &IdentityClaims) -> Result<SessionStart, AppError> {
    let lookup = state.coordinator.accounts().user_by_email(&claims.email).await;

    let record = match lookup {
        Ok(Some(record)) => record,
        Ok(None) => return Ok(registration_required(claims)),
        Err(err) => {
            warn!(email = %claims.email, error = %err, "user lookup failed; asking for registration");
            return Ok(registration_required(claims));
        }
    };

    let fallback = claims.picture.as_deref().unwrap_or_default();
    let picture = resolve_profile_picture(record.profile_picture.as_deref(), fallback);
    let user = User::from_backend(record, picture);

    state.coordinator.start(user.clone()).await?;
    Ok(SessionStart::SignedIn { user })
}

fn registration_required(claims: &IdentityClaims) -> SessionStart {
    SessionStart::RegistrationRequired {
        email: claims.email.clone(),
        first_name: claims.given_name.clone().unwrap_or_default(),
        last_name: claims.family_name.clone().unwrap_or_default(),
    }
}

async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(claims): Json<IdentityClaims>,
) -> Result<Json<SessionStart>, AppError> {
    if claims.email.trim().is_empty() {
        return Err(AppError::Validation("identity claims carry no email".to_string()));
    }

    Ok(Json(sign_in(&state, &claims).await?))
}

async fn end_session(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.coordinator.stop().await;
    Json(json!({ "phase": state.coordinator.phase() }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<Registration>,
) -> Result<Json<SessionStart>, AppError> {
    let fields = [
        ("email", &registration.email),
        ("first name", &registration.first_name),
        ("last name", &registration.last_name),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(AppError::Validation(format!("{name} is required")));
    }

    state.coordinator.accounts().register(&registration).await?;
    info!(email = %registration.email, "driver registered");

    let claims = IdentityClaims {
        email: registration.email.clone(),
        given_name: Some(registration.first_name.clone()),
        family_name: Some(registration.last_name.clone()),
        picture: None,
    };

    match sign_in(&state, &claims).await? {
        SessionStart::SignedIn { user } => Ok(Json(SessionStart::SignedIn { user })),
        SessionStart::RegistrationRequired { .. } => Err(AppError::Network(format!(
            "{} was registered but could not be loaded",
            registration.email
        ))),
    }
}

async fn account(State(state): State<Arc<AppState>>) -> Result<Json<User>, AppError> {
    Ok(Json(signed_in(&state)?))
}

async fn connected_account(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConnectedAccountResponse>, AppError> {
    let user = signed_in(&state)?;

    // Read through to the backend; onboarding may have finished elsewhere.
    let account = match state.coordinator.accounts().user(user.id).await {
        Ok(record) => record.connected_account.unwrap_or_default(),
        Err(err) => {
            warn!(user_id = user.id, error = %err, "failed to fetch connected account");
            String::new()
        }
    };
    state
        .coordinator
        .update_user(|user| user.connected_account = account.clone());

    Ok(Json(ConnectedAccountResponse {
        account,
        onboarding_url: None,
    }))
}

async fn create_connected_account(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConnectedAccountResponse>, AppError> {
    let user = signed_in(&state)?;
    let accounts = state.coordinator.accounts();

    let account = accounts.create_connected_account(user.id).await?;
    let account = account.trim().to_string();
    state
        .coordinator
        .update_user(|user| user.connected_account = account.clone());

    let onboarding_url = accounts
        .onboarding_link(user.id, &ConfirmationLink::default())
        .await?;
    let onboarding_url = onboarding_url.trim();
    if onboarding_url.is_empty() {
        return Err(AppError::Network(
            "backend returned an empty onboarding link".to_string(),
        ));
    }

    info!(user_id = user.id, "connected account created");
    Ok(Json(ConnectedAccountResponse {
        account,
        onboarding_url: Some(onboarding_url.to_string()),
    }))
}

async fn upload_profile_picture(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PictureUploadRequest>, JsonRejection>,
) -> Result<Json<PictureUploadResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => {
            AppError::Validation("image size must be less than 5MB".to_string())
        }
        _ => AppError::Validation(rejection.body_text()),
    })?;
    let user = signed_in(&state)?;

    let bytes = STANDARD
        .decode(payload.data.trim())
        .map_err(|err| AppError::Validation(format!("upload is not valid base64: {err}")))?;
    let encoded = encode_upload(&bytes, &payload.content_type)?;

    let upload = ProfilePictureUpload {
        user_id: user.id,
        encoded_image: encoded.hex,
    };
    state
        .coordinator
        .accounts()
        .upload_profile_picture(&upload)
        .await?;

    state
        .coordinator
        .update_user(|user| user.profile_picture = encoded.preview.clone());
    info!(user_id = user.id, width = encoded.width, height = encoded.height, "profile picture updated");

    Ok(Json(PictureUploadResponse {
        preview: encoded.preview,
        width: encoded.width,
        height: encoded.height,
    }))
}

async fn ping_backend(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let status = state.coordinator.accounts().ping().await?;
    Ok(Json(json!({ "status": status })))
}
