use std::sync::Arc;

use serde::Serialize;

use crate::backend::{AccountService, PickupService};
use crate::engine::{Coordinator, Timings};
use crate::geo::Geocoder;

/// Options the view layer passes to the platform geolocation watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationOptions {
    pub enable_high_accuracy: bool,
    pub timeout_ms: u64,
    pub initial_maximum_age_ms: u64,
    pub watch_maximum_age_ms: u64,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout_ms: 10_000,
            initial_maximum_age_ms: 30_000,
            watch_maximum_age_ms: 10_000,
        }
    }
}

pub struct AppState {
    pub coordinator: Coordinator,
    pub geolocation: GeolocationOptions,
}

impl AppState {
    pub fn new(
        pickups: Arc<dyn PickupService>,
        accounts: Arc<dyn AccountService>,
        geocoder: Arc<dyn Geocoder>,
        timings: Timings,
        event_buffer_size: usize,
    ) -> Self {
        Self {
            coordinator: Coordinator::new(pickups, accounts, geocoder, timings, event_buffer_size),
            geolocation: GeolocationOptions::default(),
        }
    }
}
