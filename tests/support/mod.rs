#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pickup_driver::backend::{AccountService, PickupService};
use pickup_driver::engine::{Coordinator, Timings};
use pickup_driver::error::AppError;
use pickup_driver::geo::Geocoder;
use pickup_driver::models::card::PaymentCard;
use pickup_driver::models::location::GeoPoint;
use pickup_driver::models::pickup::{PendingPickup, PickupRecord, PickupUpdate};
use pickup_driver::models::user::{
    BackendUser, ConfirmationLink, ProfilePictureUpload, Registration, User,
};

pub const DRIVER_ID: i64 = 9;
pub const DRIVER_EMAIL: &str = "driver@example.com";

#[derive(Default)]
pub struct Script {
    pub pending: Vec<PendingPickup>,
    pub cards: Vec<PaymentCard>,
    pub users: HashMap<String, BackendUser>,
    pub eta_body: String,
    pub fail_progress: bool,
    pub fail_complete: bool,
    pub fail_lookup: bool,
    pub fail_user: bool,
    pub fail_pending: bool,
    pub fail_eta: bool,
    pub fail_report: bool,
    /// Progress and complete calls never answer while set.
    pub hang_progress: bool,
    pub hang_complete: bool,
    pub onboarding_url: String,
}

/// In-memory backend that records every call as `"<call>:<argument>"`.
#[derive(Default)]
pub struct FakeBackend {
    pub script: Mutex<Script>,
    calls: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, PickupUpdate)>>,
    registrations: Mutex<Vec<Registration>>,
    uploads: Mutex<Vec<ProfilePictureUpload>>,
}

impl FakeBackend {
    pub fn with_pickups_and_cards() -> Arc<Self> {
        let backend = Self::default();
        {
            let mut script = backend.script.lock().unwrap();
            script.pending = vec![
                pending("1", "1 Main St", None),
                pending("2", "Unknown Rd", None),
                pending("3", "3 Harbor Way", Some(GeoPoint { lat: 10.0, lng: 20.0 })),
            ];
            script.cards = vec![card(7, "pm_1RTPNgFawibChNbg"), card(3, "4242")];
            script.eta_body = r#"{"estimatedTime": "12 mins", "distance": "3.1 km"}"#.to_string();
            script.users.insert(DRIVER_EMAIL.to_string(), backend_user());
            script.onboarding_url = "https://connect.example/onboard".to_string();
        }
        Arc::new(backend)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        let prefix = format!("{call}:");
        self.calls()
            .iter()
            .filter(|recorded| recorded.starts_with(&prefix))
            .count()
    }

    pub fn updates(&self, call: &str) -> Vec<PickupUpdate> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(recorded, _)| recorded == call)
            .map(|(_, update)| update.clone())
            .collect()
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<ProfilePictureUpload> {
        self.uploads.lock().unwrap().clone()
    }

    fn record(&self, call: &str, argument: impl ToString) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{call}:{}", argument.to_string()));
    }

    fn record_update(&self, call: &str, pickup_id: &str, update: &PickupUpdate) {
        self.record(call, pickup_id);
        self.updates
            .lock()
            .unwrap()
            .push((call.to_string(), update.clone()));
    }
}

#[async_trait]
impl PickupService for FakeBackend {
    async fn pending_pickups(&self) -> Result<Vec<PendingPickup>, AppError> {
        self.record("pending", "");
        let script = self.script.lock().unwrap();
        if script.fail_pending {
            return Err(AppError::Network("pending pickups failed: 502".to_string()));
        }
        Ok(script.pending.clone())
    }

    async fn mark_in_progress(&self, pickup_id: &str, update: &PickupUpdate) -> Result<(), AppError> {
        self.record_update("progress", pickup_id, update);
        let hang = self.script.lock().unwrap().hang_progress;
        if hang {
            std::future::pending::<()>().await;
        }
        if self.script.lock().unwrap().fail_progress {
            return Err(AppError::Network("progress failed: 500".to_string()));
        }
        Ok(())
    }

    async fn eta(&self, pickup_id: &str) -> Result<String, AppError> {
        self.record("eta", pickup_id);
        let script = self.script.lock().unwrap();
        if script.fail_eta {
            return Err(AppError::Network("pickup eta failed: 500".to_string()));
        }
        Ok(script.eta_body.clone())
    }

    async fn report_driver_location(
        &self,
        pickup_id: &str,
        update: &PickupUpdate,
    ) -> Result<(), AppError> {
        self.record_update("dLocation", pickup_id, update);
        if self.script.lock().unwrap().fail_report {
            return Err(AppError::Network("driver location failed: 503".to_string()));
        }
        Ok(())
    }

    async fn complete(&self, pickup_id: &str, update: &PickupUpdate) -> Result<(), AppError> {
        self.record_update("complete", pickup_id, update);
        let hang = self.script.lock().unwrap().hang_complete;
        if hang {
            std::future::pending::<()>().await;
        }
        if self.script.lock().unwrap().fail_complete {
            return Err(AppError::Network("complete failed: 503".to_string()));
        }
        Ok(())
    }

    async fn history(&self, user_id: i64) -> Result<Vec<PickupRecord>, AppError> {
        self.record("history", user_id);
        let record = serde_json::from_value(serde_json::json!({
            "pickupLocation": "1 Main St",
            "value": 4.5,
            "status": "COMPLETED"
        }))
        .map_err(|err| AppError::Internal(err.to_string()))?;
        Ok(vec![record])
    }
}

#[async_trait]
impl AccountService for FakeBackend {
    async fn user(&self, user_id: i64) -> Result<BackendUser, AppError> {
        self.record("user", user_id);
        let script = self.script.lock().unwrap();
        if script.fail_user {
            return Err(AppError::Network("user failed: 500".to_string()));
        }
        script
            .users
            .values()
            .find(|user| user.id == user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<BackendUser>, AppError> {
        self.record("user_by_email", email);
        let script = self.script.lock().unwrap();
        if script.fail_lookup {
            return Err(AppError::Network("connection refused".to_string()));
        }
        Ok(script.users.get(email).cloned())
    }

    async fn register(&self, registration: &Registration) -> Result<(), AppError> {
        self.record("register", &registration.email);
        self.registrations.lock().unwrap().push(registration.clone());

        let mut script = self.script.lock().unwrap();
        let id = 100 + script.users.len() as i64;
        script.users.insert(
            registration.email.clone(),
            BackendUser {
                id,
                email: registration.email.clone(),
                first_name: registration.first_name.clone(),
                last_name: registration.last_name.clone(),
                ..BackendUser::default()
            },
        );
        Ok(())
    }

    async fn cards(&self, user_id: i64) -> Result<Vec<PaymentCard>, AppError> {
        self.record("cards", user_id);
        Ok(self.script.lock().unwrap().cards.clone())
    }

    async fn upload_profile_picture(&self, upload: &ProfilePictureUpload) -> Result<(), AppError> {
        self.record("upload_picture", upload.user_id);
        self.uploads.lock().unwrap().push(upload.clone());
        Ok(())
    }

    async fn create_connected_account(&self, user_id: i64) -> Result<String, AppError> {
        self.record("create_account", user_id);
        let mut script = self.script.lock().unwrap();
        if let Some(user) = script.users.values_mut().find(|user| user.id == user_id) {
            user.connected_account = Some("acct_123".to_string());
        }
        Ok("acct_123\n".to_string())
    }

    async fn onboarding_link(&self, user_id: i64, _link: &ConfirmationLink) -> Result<String, AppError> {
        self.record("onboarding_link", user_id);
        Ok(self.script.lock().unwrap().onboarding_url.clone())
    }

    async fn ping(&self) -> Result<u16, AppError> {
        self.record("ping", "");
        Ok(204)
    }
}

/// Knows a fixed set of addresses; reverse lookups name the coordinates.
#[derive(Default)]
pub struct FakeGeocoder {
    pub locate_calls: AtomicUsize,
    pub describe_calls: AtomicUsize,
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn locate(&self, address: &str) -> Result<GeoPoint, AppError> {
        self.locate_calls.fetch_add(1, Ordering::SeqCst);
        match address {
            "1 Main St" => Ok(GeoPoint { lat: 40.0, lng: -73.0 }),
            _ => Err(AppError::Geocoding(format!("no results for {address}"))),
        }
    }

    async fn describe(&self, point: GeoPoint) -> Result<String, AppError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("near {:.1}, {:.1}", point.lat, point.lng))
    }
}

pub fn pending(id: &str, address: &str, point: Option<GeoPoint>) -> PendingPickup {
    PendingPickup {
        id: id.to_string(),
        address: address.to_string(),
        value: 2.5,
        lat: point.map(|point| point.lat),
        lng: point.map(|point| point.lng),
    }
}

pub fn card(card_id: i64, number: &str) -> PaymentCard {
    PaymentCard {
        card_id,
        card_number: number.to_string(),
        cardholder_name: "Ana Driver".to_string(),
        account_id: format!("acct_{card_id}"),
        user_id: DRIVER_ID,
    }
}

pub fn backend_user() -> BackendUser {
    BackendUser {
        id: DRIVER_ID,
        email: DRIVER_EMAIL.to_string(),
        profile_picture: None,
        rating: Some(4.8),
        first_name: "Ana".to_string(),
        last_name: "Driver".to_string(),
        connected_account: None,
    }
}

pub fn driver() -> User {
    User::from_backend(backend_user(), String::new())
}

pub fn coordinator(backend: &Arc<FakeBackend>, geocoder: &Arc<FakeGeocoder>) -> Coordinator {
    Coordinator::new(
        backend.clone(),
        backend.clone(),
        geocoder.clone(),
        Timings::default(),
        64,
    )
}
