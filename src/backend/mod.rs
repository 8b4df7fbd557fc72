//! Narrow interfaces to the business backend. The coordinator and handlers
//! only see these traits; [`http::HttpBackend`] is the production client.

pub mod http;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::card::PaymentCard;
use crate::models::pickup::{PendingPickup, PickupRecord, PickupUpdate};
use crate::models::user::{BackendUser, ConfirmationLink, ProfilePictureUpload, Registration};

pub use http::HttpBackend;

#[async_trait]
pub trait PickupService: Send + Sync {
    async fn pending_pickups(&self) -> Result<Vec<PendingPickup>, AppError>;

    async fn mark_in_progress(&self, pickup_id: &str, update: &PickupUpdate) -> Result<(), AppError>;

    /// Raw ETA body; it may be JSON or plain text.
    async fn eta(&self, pickup_id: &str) -> Result<String, AppError>;

    async fn report_driver_location(
        &self,
        pickup_id: &str,
        update: &PickupUpdate,
    ) -> Result<(), AppError>;

    async fn complete(&self, pickup_id: &str, update: &PickupUpdate) -> Result<(), AppError>;

    async fn history(&self, user_id: i64) -> Result<Vec<PickupRecord>, AppError>;
}

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn user(&self, user_id: i64) -> Result<BackendUser, AppError>;

    /// `None` when no user is registered under `email`.
    async fn user_by_email(&self, email: &str) -> Result<Option<BackendUser>, AppError>;

    async fn register(&self, registration: &Registration) -> Result<(), AppError>;

    async fn cards(&self, user_id: i64) -> Result<Vec<PaymentCard>, AppError>;

    async fn upload_profile_picture(&self, upload: &ProfilePictureUpload) -> Result<(), AppError>;

    /// Creates the payout account and returns its account number.
    async fn create_connected_account(&self, user_id: i64) -> Result<String, AppError>;

    /// Returns the hosted onboarding URL for the payout account.
    async fn onboarding_link(&self, user_id: i64, link: &ConfirmationLink) -> Result<String, AppError>;

    /// Connectivity probe; returns the HTTP status the backend answered with.
    async fn ping(&self) -> Result<u16, AppError>;
}
