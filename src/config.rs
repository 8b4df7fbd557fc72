use std::env;
use std::time::Duration;

use crate::engine::Timings;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub backend_url: String,
    pub backend_timeout: Duration,
    pub backend_accept_invalid_certs: bool,
    pub google_maps_api_key: Option<String>,
    pub timings: Timings,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "https://localhost:8443".to_string()),
            backend_timeout: Duration::from_millis(parse_or_default("BACKEND_TIMEOUT_MS", 10_000)?),
            backend_accept_invalid_certs: parse_or_default("BACKEND_ACCEPT_INVALID_CERTS", false)?,
            google_maps_api_key: env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            timings: Timings {
                pending_poll: Duration::from_secs(non_zero("PENDING_POLL_SECS", 30)?),
                eta_poll: Duration::from_secs(non_zero("ETA_POLL_SECS", 30)?),
                location_report: Duration::from_secs(non_zero("LOCATION_REPORT_SECS", 10)?),
                location_throttle: Duration::from_millis(parse_or_default(
                    "LOCATION_THROTTLE_MS",
                    2_000,
                )?),
            },
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 256)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

// Poll periods feed tokio intervals, which reject a zero period.
fn non_zero(key: &str, default: u64) -> Result<u64, AppError> {
    match parse_or_default(key, default)? {
        0 => Err(AppError::Internal(format!("invalid {key}: must be > 0"))),
        value => Ok(value),
    }
}
