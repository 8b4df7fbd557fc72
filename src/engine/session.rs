use std::sync::Arc;

use chrono::{DateTime, Utc};
use prometheus::IntGauge;
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::engine::activities::{self, Activities};
use crate::engine::coordinator::Shared;
use crate::models::location::GeoPoint;
use crate::models::pickup::{EtaEstimate, PickupLocation, PickupUpdate};

/// The parts of a session its background activities read and write.
pub(crate) struct SessionTrack {
    pub id: Uuid,
    pub pickup: PickupLocation,
    pub card_id: i64,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
    pub address: watch::Sender<Option<String>>,
    pub eta: watch::Sender<Option<EtaEstimate>>,
}

impl SessionTrack {
    pub fn update(&self, driver_location: String) -> PickupUpdate {
        PickupUpdate::new(driver_location, &self.pickup, self.user_id, self.card_id)
    }
}

/// One in-progress pickup. Location tracking, ETA polling and location
/// reporting start with the session and are aborted when it is dropped.
pub struct PickupSession {
    track: Arc<SessionTrack>,
    active_sessions: IntGauge,
    _activities: Activities,
}

impl PickupSession {
    pub(crate) fn start(shared: &Arc<Shared>, pickup: PickupLocation, card_id: i64, user_id: i64) -> Self {
        let track = Arc::new(SessionTrack {
            id: Uuid::new_v4(),
            pickup,
            card_id,
            user_id,
            started_at: Utc::now(),
            address: watch::channel(None).0,
            eta: watch::channel(None).0,
        });

        let mut tasks = Activities::default();
        tasks.spawn(activities::track_location(shared.clone(), track.clone()));
        tasks.spawn(activities::poll_eta(shared.clone(), track.clone()));
        tasks.spawn(activities::report_driver_location(shared.clone(), track.clone()));

        let active_sessions = shared.metrics.active_sessions.clone();
        active_sessions.inc();

        Self {
            track,
            active_sessions,
            _activities: tasks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.track.id
    }

    pub fn pickup(&self) -> &PickupLocation {
        &self.track.pickup
    }

    pub fn current_address(&self) -> Option<String> {
        self.track.address.borrow().clone()
    }

    pub(crate) fn completion_update(&self, address: String) -> PickupUpdate {
        self.track.update(address)
    }

    pub fn view(&self, driver_location: Option<GeoPoint>) -> SessionView {
        SessionView {
            session_id: self.track.id,
            pickup: self.track.pickup.clone(),
            card_id: self.track.card_id,
            started_at: self.track.started_at,
            driver_location,
            address: self.current_address(),
            eta: self.track.eta.borrow().clone(),
        }
    }
}

impl Drop for PickupSession {
    fn drop(&mut self) {
        self.active_sessions.dec();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub pickup: PickupLocation,
    pub card_id: i64,
    pub started_at: DateTime<Utc>,
    pub driver_location: Option<GeoPoint>,
    pub address: Option<String>,
    pub eta: Option<EtaEstimate>,
}
