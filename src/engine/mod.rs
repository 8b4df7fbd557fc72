//! The pickup lifecycle: what the driver is doing right now, and the timers,
//! location follower and backend calls that belong to each phase.

pub mod activities;
pub mod coordinator;
pub mod session;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::GeolocationError;
use crate::models::location::GeoPoint;
use crate::models::pickup::{EtaEstimate, PickupLocation};

pub use coordinator::{CardSelectionView, Coordinator, PositionOutcome};
pub use session::SessionView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub pending_poll: Duration,
    pub eta_poll: Duration,
    pub location_report: Duration,
    pub location_throttle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            pending_poll: Duration::from_secs(30),
            eta_poll: Duration::from_secs(30),
            location_report: Duration::from_secs(10),
            location_throttle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Browsing,
    CardSelection,
    Committing,
    InProgress,
    Completing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Browsing => "browsing",
            Phase::CardSelection => "card_selection",
            Phase::Committing => "committing",
            Phase::InProgress => "in_progress",
            Phase::Completing => "completing",
        }
    }
}

/// Everything the view layer renders from, in the order it happened.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl LifecycleEvent {
    pub fn now(kind: EventKind) -> Self {
        Self { at: Utc::now(), kind }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    PhaseChanged { phase: Phase },
    PendingPickups { pickups: Vec<PickupLocation> },
    DriverMoved { location: GeoPoint },
    LocationUnavailable { reason: GeolocationError },
    AddressResolved { session_id: Uuid, address: String },
    EtaUpdated { session_id: Uuid, eta: EtaEstimate },
    CenterMap { location: GeoPoint },
    Notice { message: String },
}
