use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::backend::{AccountService, PickupService};
use crate::engine::activities::{self, Activities};
use crate::engine::session::{PickupSession, SessionView};
use crate::engine::{EventKind, LifecycleEvent, Phase, Timings};
use crate::error::{AppError, GeolocationError};
use crate::geo::{locate_or_fallback, Geocoder, Throttle};
use crate::models::card::PaymentCard;
use crate::models::location::GeoPoint;
use crate::models::pickup::{PickupLocation, PickupUpdate};
use crate::models::user::User;
use crate::observability::metrics::Metrics;

/// State shared between the coordinator and the activities it spawns.
pub(crate) struct Shared {
    pub pickups: Arc<dyn PickupService>,
    pub accounts: Arc<dyn AccountService>,
    pub geocoder: Arc<dyn Geocoder>,
    pub timings: Timings,
    pub metrics: Metrics,
    pub events: broadcast::Sender<LifecycleEvent>,
    /// Last accepted driver fix. Written only by [`Coordinator::on_position`].
    pub driver_location: watch::Sender<Option<GeoPoint>>,
    pub pending: DashMap<String, PickupLocation>,
}

impl Shared {
    pub fn emit(&self, kind: EventKind) {
        let _ = self.events.send(LifecycleEvent::now(kind));
    }

    pub fn current_location(&self) -> Option<GeoPoint> {
        *self.driver_location.borrow()
    }

    pub fn pending_sorted(&self) -> Vec<PickupLocation> {
        let mut pickups: Vec<PickupLocation> = self
            .pending
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        pickups.sort_by_key(|pickup| (pickup.id.parse::<u64>().unwrap_or(u64::MAX), pickup.id.clone()));
        pickups
    }

    /// Fetches pending pickups and geocodes any that arrive without coordinates.
    pub async fn refresh_pending(&self) -> Result<usize, AppError> {
        let listed = match self.pickups.pending_pickups().await {
            Ok(listed) => listed,
            Err(err) => {
                self.metrics.record_poll("pending_pickups", false);
                return Err(err);
            }
        };

        let mut resolved = Vec::with_capacity(listed.len());
        for pending in listed {
            let known = self
                .pending
                .get(&pending.id)
                .filter(|known| known.address == pending.address)
                .map(|known| known.point());

            let point = match pending.coordinates().or(known) {
                Some(point) => point,
                None => locate_or_fallback(self.geocoder.as_ref(), &pending.address).await,
            };
            resolved.push(PickupLocation::from_pending(pending, point));
        }

        let ids: HashSet<String> = resolved.iter().map(|pickup| pickup.id.clone()).collect();
        self.pending.retain(|id, _| ids.contains(id));
        for pickup in resolved {
            self.pending.insert(pickup.id.clone(), pickup);
        }

        self.metrics.record_poll("pending_pickups", true);
        self.emit(EventKind::PendingPickups {
            pickups: self.pending_sorted(),
        });

        Ok(ids.len())
    }
}

enum Stage {
    Idle,
    Browsing {
        poller: Activities,
    },
    CardSelection {
        poller: Activities,
        pickup: PickupLocation,
        cards: Vec<PaymentCard>,
        notice: Option<String>,
    },
    InProgress {
        session: PickupSession,
    },
    /// A completion attempt failed; the session stays alive for a retry.
    Completing {
        session: PickupSession,
    },
}

impl Stage {
    fn session(&self) -> Option<&PickupSession> {
        match self {
            Stage::InProgress { session } | Stage::Completing { session } => Some(session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionOutcome {
    Accepted,
    Throttled,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardOption {
    pub card_id: i64,
    pub cardholder_name: String,
    pub masked_number: String,
    pub account_id: String,
}

impl From<&PaymentCard> for CardOption {
    fn from(card: &PaymentCard) -> Self {
        Self {
            card_id: card.card_id,
            cardholder_name: card.cardholder_name.clone(),
            masked_number: card.masked_number(),
            account_id: card.account_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CardSelectionView {
    pub pickup: PickupLocation,
    pub cards: Vec<CardOption>,
    pub notice: Option<String>,
}

/// Drives one driver through browse, card selection, commit, transit and
/// completion. One-shot transitions are serialised by the stage lock;
/// background activities never take it.
pub struct Coordinator {
    shared: Arc<Shared>,
    stage: Mutex<Stage>,
    phase: watch::Sender<Phase>,
    user: watch::Sender<Option<User>>,
    throttle: Mutex<Throttle>,
}

impl Coordinator {
    pub fn new(
        pickups: Arc<dyn PickupService>,
        accounts: Arc<dyn AccountService>,
        geocoder: Arc<dyn Geocoder>,
        timings: Timings,
        event_buffer_size: usize,
    ) -> Self {
        let (events, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            shared: Arc::new(Shared {
                pickups,
                accounts,
                geocoder,
                timings,
                metrics: Metrics::new(),
                events,
                driver_location: watch::channel(None).0,
                pending: DashMap::new(),
            }),
            stage: Mutex::new(Stage::Idle),
            phase: watch::channel(Phase::Idle).0,
            user: watch::channel(None).0,
            throttle: Mutex::new(Throttle::new(timings.location_throttle)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.shared.events.subscribe()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    pub fn accounts(&self) -> &Arc<dyn AccountService> {
        &self.shared.accounts
    }

    pub fn pickups(&self) -> &Arc<dyn PickupService> {
        &self.shared.pickups
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    /// Applies `change` to the signed-in user, if any, and returns the result.
    pub fn update_user(&self, change: impl FnOnce(&mut User)) -> Option<User> {
        self.user.send_modify(|user| {
            if let Some(user) = user.as_mut() {
                change(user);
            }
        });
        self.user()
    }

    pub fn current_location(&self) -> Option<GeoPoint> {
        self.shared.current_location()
    }

    pub fn pending_pickups(&self) -> Vec<PickupLocation> {
        self.shared.pending_sorted()
    }

    pub async fn refresh_pending(&self) -> Result<usize, AppError> {
        self.shared.refresh_pending().await
    }

    /// Signs `user` in. From Idle this starts browsing; otherwise only the
    /// profile is replaced.
    pub async fn start(&self, user: User) -> Result<(), AppError> {
        let mut stage = self.stage.lock().await;

        if let Some(session) = stage.session() {
            let signed_in = self.user().map(|current| current.id);
            if signed_in != Some(user.id) {
                return Err(AppError::InvalidState(format!(
                    "pickup {} is still in progress for another driver",
                    session.pickup().id
                )));
            }
        }

        info!(user_id = user.id, "driver signed in");
        self.user.send_replace(Some(user));

        if matches!(*stage, Stage::Idle) {
            *stage = Stage::Browsing {
                poller: self.browse_activities(),
            };
            self.set_phase(Phase::Browsing);
        }

        Ok(())
    }

    /// Tears everything down, as when the driver's view goes away.
    pub async fn stop(&self) {
        let mut stage = self.stage.lock().await;
        *stage = Stage::Idle;
        self.shared.pending.clear();
        self.user.send_replace(None);
        self.set_phase(Phase::Idle);
    }

    /// Feeds one geolocation callback. Fixes arriving faster than the throttle
    /// allows are dropped without touching the location cell.
    pub async fn on_position(&self, fix: Result<GeoPoint, GeolocationError>) -> PositionOutcome {
        let point = match fix {
            Ok(point) => point,
            Err(reason) => {
                self.shared
                    .metrics
                    .location_updates_total
                    .with_label_values(&["error"])
                    .inc();
                warn!(error = %reason, "geolocation error; keeping last known location");
                self.shared.emit(EventKind::LocationUnavailable { reason });
                return PositionOutcome::Unavailable;
            }
        };

        if !self.throttle.lock().await.admit(Instant::now()) {
            self.shared
                .metrics
                .location_updates_total
                .with_label_values(&["throttled"])
                .inc();
            return PositionOutcome::Throttled;
        }

        self.shared.driver_location.send_replace(Some(point));
        self.shared
            .metrics
            .location_updates_total
            .with_label_values(&["accepted"])
            .inc();
        self.shared.emit(EventKind::DriverMoved { location: point });
        PositionOutcome::Accepted
    }

    /// Asks the map layer to recentre on the driver.
    pub fn center_on_driver(&self) -> Result<GeoPoint, AppError> {
        let location = self
            .current_location()
            .ok_or(GeolocationError::Unavailable)?;
        self.shared.emit(EventKind::CenterMap { location });
        Ok(location)
    }

    pub async fn select_pickup(&self, pickup_id: &str) -> Result<CardSelectionView, AppError> {
        let mut stage = self.stage.lock().await;
        if !matches!(*stage, Stage::Browsing { .. }) {
            return Err(self.not_now("select a pickup"));
        }

        if self.current_location().is_none() {
            return Err(GeolocationError::Unavailable.into());
        }

        let user = self
            .user()
            .filter(User::is_loaded)
            .ok_or_else(|| AppError::InvalidState("your profile is still loading".to_string()))?;

        let pickup = self
            .shared
            .pending
            .get(pickup_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("pickup {pickup_id} is no longer pending")))?;

        let (cards, notice) = match self.shared.accounts.cards(user.id).await {
            Ok(mut cards) if !cards.is_empty() => {
                cards.sort_by_key(|card| card.card_id);
                (cards, None)
            }
            Ok(_) => (
                Vec::new(),
                Some("No payment cards found. Add a debit card first to start pickups.".to_string()),
            ),
            Err(err) => {
                warn!(user_id = user.id, error = %err, "failed to load payment cards");
                (
                    Vec::new(),
                    Some("Unable to load cards. Please check your connection.".to_string()),
                )
            }
        };

        let Stage::Browsing { poller } = mem::replace(&mut *stage, Stage::Idle) else {
            return Err(AppError::Internal("stage changed while locked".to_string()));
        };

        let view = CardSelectionView {
            pickup: pickup.clone(),
            cards: cards.iter().map(CardOption::from).collect(),
            notice: notice.clone(),
        };

        *stage = Stage::CardSelection {
            poller,
            pickup,
            cards,
            notice: notice.clone(),
        };
        self.set_phase(Phase::CardSelection);
        if let Some(message) = notice {
            self.shared.emit(EventKind::Notice { message });
        }

        Ok(view)
    }

    pub async fn card_selection(&self) -> Option<CardSelectionView> {
        match &*self.stage.lock().await {
            Stage::CardSelection {
                pickup,
                cards,
                notice,
                ..
            } => Some(CardSelectionView {
                pickup: pickup.clone(),
                cards: cards.iter().map(CardOption::from).collect(),
                notice: notice.clone(),
            }),
            _ => None,
        }
    }

    pub async fn cancel_selection(&self) -> Result<(), AppError> {
        let mut stage = self.stage.lock().await;
        match mem::replace(&mut *stage, Stage::Idle) {
            Stage::CardSelection { poller, .. } => {
                *stage = Stage::Browsing { poller };
                self.set_phase(Phase::Browsing);
                Ok(())
            }
            other => {
                *stage = other;
                Err(self.not_now("cancel card selection"))
            }
        }
    }

    /// Commits to the selected pickup with `raw_card_id`. Invalid ids are
    /// rejected before any network call; a failed commit returns to browsing.
    /// The selection stays in place until the backend answers, so an
    /// abandoned call leaves the driver on the card list.
    pub async fn choose_card(&self, raw_card_id: &str) -> Result<SessionView, AppError> {
        let mut stage = self.stage.lock().await;
        let Stage::CardSelection { pickup, cards, .. } = &*stage else {
            return Err(self.not_now("choose a card"));
        };

        let card_id = parse_card_id(raw_card_id)?;
        if !cards.iter().any(|card| card.card_id == card_id) {
            return Err(AppError::Validation(format!(
                "card {card_id} is not one of your saved cards"
            )));
        }

        let location = self
            .current_location()
            .ok_or(GeolocationError::Unavailable)?;
        let user = self
            .user()
            .ok_or_else(|| AppError::InvalidState("no driver is signed in".to_string()))?;

        let pickup = pickup.clone();
        let update = PickupUpdate::new(location.to_coordinate_text(), &pickup, user.id, card_id);

        let rollback = PhaseRollback::enter(self, Phase::Committing);
        let committed = self.shared.pickups.mark_in_progress(&pickup.id, &update).await;
        rollback.disarm();

        let Stage::CardSelection { poller, .. } = mem::replace(&mut *stage, Stage::Idle) else {
            return Err(AppError::Internal("stage changed while locked".to_string()));
        };

        if let Err(err) = committed {
            warn!(pickup_id = %pickup.id, error = %err, "failed to start pickup");
            *stage = Stage::Browsing { poller };
            self.set_phase(Phase::Browsing);
            self.shared.emit(EventKind::Notice {
                message: format!("Could not start pickup {}: {err}", pickup.id),
            });
            return Err(err);
        }

        drop(poller);
        let session = PickupSession::start(&self.shared, pickup, card_id, user.id);
        info!(
            session_id = %session.id(),
            pickup_id = %session.pickup().id,
            card_id,
            "pickup in progress"
        );

        let view = session.view(Some(location));
        *stage = Stage::InProgress { session };
        self.set_phase(Phase::InProgress);

        Ok(view)
    }

    pub async fn session(&self) -> Option<SessionView> {
        let stage = self.stage.lock().await;
        stage
            .session()
            .map(|session| session.view(self.current_location()))
    }

    /// Marks the pickup complete. On failure the session stays alive in
    /// Completing so the driver can retry.
    pub async fn complete(&self) -> Result<(), AppError> {
        let mut stage = self.stage.lock().await;
        let Some(session) = stage.session() else {
            return Err(self.not_now("complete a pickup"));
        };

        let Some(address) = session.current_address() else {
            return Err(AppError::Geolocation(GeolocationError::Unavailable));
        };

        let pickup_id = session.pickup().id.clone();
        let session_id = session.id();
        let update = session.completion_update(address);

        let rollback = PhaseRollback::enter(self, Phase::Completing);
        let completed = self.shared.pickups.complete(&pickup_id, &update).await;
        rollback.disarm();

        match completed {
            Ok(()) => {
                *stage = Stage::Browsing {
                    poller: self.browse_activities(),
                };
                self.set_phase(Phase::Browsing);
                info!(%session_id, %pickup_id, "pickup completed");
                Ok(())
            }
            Err(err) => {
                warn!(%session_id, %pickup_id, error = %err, "failed to complete pickup");
                *stage = match mem::replace(&mut *stage, Stage::Idle) {
                    Stage::InProgress { session } | Stage::Completing { session } => {
                        Stage::Completing { session }
                    }
                    other => other,
                };
                self.shared.emit(EventKind::Notice {
                    message: format!("Failed to complete pickup {pickup_id}: {err}"),
                });
                Err(err)
            }
        }
    }

    /// Leaves an active pickup without completing it.
    pub async fn abandon(&self) -> Result<(), AppError> {
        let mut stage = self.stage.lock().await;
        let Some(session) = stage.session() else {
            return Err(self.not_now("leave a pickup"));
        };

        info!(session_id = %session.id(), pickup_id = %session.pickup().id, "pickup abandoned");
        *stage = Stage::Browsing {
            poller: self.browse_activities(),
        };
        self.set_phase(Phase::Browsing);
        Ok(())
    }

    fn browse_activities(&self) -> Activities {
        let mut poller = Activities::default();
        poller.spawn(activities::poll_pending_pickups(self.shared.clone()));
        poller
    }

    fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous == phase {
            return;
        }

        self.shared
            .metrics
            .transitions_total
            .with_label_values(&[phase.as_str()])
            .inc();
        info!(from = previous.as_str(), to = phase.as_str(), "lifecycle phase changed");
        self.shared.emit(EventKind::PhaseChanged { phase });
    }

    fn not_now(&self, action: &str) -> AppError {
        AppError::InvalidState(format!("cannot {action} while {}", self.phase().as_str()))
    }
}

/// Publishes a transient phase for the duration of a backend call and puts
/// the previous phase back if the call is dropped before it resolves.
struct PhaseRollback<'a> {
    coordinator: &'a Coordinator,
    previous: Phase,
    armed: bool,
}

impl<'a> PhaseRollback<'a> {
    fn enter(coordinator: &'a Coordinator, transient: Phase) -> Self {
        let previous = coordinator.phase();
        coordinator.set_phase(transient);
        Self {
            coordinator,
            previous,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseRollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(phase = self.previous.as_str(), "backend call abandoned; phase restored");
            self.coordinator.set_phase(self.previous);
        }
    }
}

/// Card ids must be positive integers.
pub fn parse_card_id(raw: &str) -> Result<i64, AppError> {
    match raw.trim().parse::<i64>() {
        Ok(card_id) if card_id > 0 => Ok(card_id),
        _ => Err(AppError::Validation(format!(
            "{raw:?} is not a valid card id"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_card_id;
    use crate::error::AppError;

    #[test]
    fn only_positive_integers_are_card_ids() {
        assert_eq!(parse_card_id("12").unwrap(), 12);
        assert_eq!(parse_card_id(" 7 ").unwrap(), 7);

        for raw in ["0", "-3", "abc", "", "1.5"] {
            assert!(matches!(parse_card_id(raw), Err(AppError::Validation(_))));
        }
    }
}
