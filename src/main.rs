use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pickup_driver::api;
use pickup_driver::backend::http::{build_client, HttpBackend};
use pickup_driver::config::Config;
use pickup_driver::error::AppError;
use pickup_driver::geo::geocoder::{DisabledGeocoder, GoogleGeocoder};
use pickup_driver::geo::Geocoder;
use pickup_driver::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let client = build_client(config.backend_timeout, config.backend_accept_invalid_certs)?;
    let backend = Arc::new(HttpBackend::new(client.clone(), &config.backend_url)?);

    let geocoder: Arc<dyn Geocoder> = match config.google_maps_api_key.clone() {
        Some(api_key) => Arc::new(GoogleGeocoder::new(client, api_key)),
        None => {
            tracing::warn!("GOOGLE_MAPS_API_KEY not set; geocoding falls back to coordinates");
            Arc::new(DisabledGeocoder)
        }
    };

    let state = Arc::new(AppState::new(
        backend.clone(),
        backend,
        geocoder,
        config.timings,
        config.event_buffer_size,
    ));

    let app = api::rest::router(state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        backend = %config.backend_url,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    state.coordinator.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
