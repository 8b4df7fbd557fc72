use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

use crate::backend::{AccountService, PickupService};
use crate::error::AppError;
use crate::models::card::PaymentCard;
use crate::models::pickup::{PendingPickup, PickupRecord, PickupUpdate};
use crate::models::user::{BackendUser, ConfirmationLink, ProfilePictureUpload, Registration};

const PICKUPS: [&str; 2] = ["api", "sgrPickup"];
const USERS: [&str; 2] = ["api", "users"];

pub fn build_client(timeout: Duration, accept_invalid_certs: bool) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))
}

/// JSON-over-HTTPS client for the business backend.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(client: Client, base_url: &str) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| AppError::Internal(format!("invalid backend url {base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Internal(format!(
                "backend url {base_url} cannot carry a path"
            )));
        }

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn pickup_endpoint(&self, tail: &[&str]) -> Url {
        self.endpoint(&[&PICKUPS[..], tail].concat())
    }

    fn user_endpoint(&self, tail: &[&str]) -> Url {
        self.endpoint(&[&USERS[..], tail].concat())
    }

    async fn send(&self, request: RequestBuilder, call: &str) -> Result<Response, AppError> {
        let response = request
            .send()
            .await
            .map_err(|err| AppError::Network(format!("{call}: {err}")))?;

        let status = response.status();
        debug!(call, %status, "backend responded");
        if status.is_success() {
            return Ok(response);
        }

        let detail = response.text().await.unwrap_or_default();
        Err(AppError::Network(format!("{call} failed: {status} - {detail}")))
    }

    async fn text(&self, request: RequestBuilder, call: &str) -> Result<String, AppError> {
        self.send(request, call)
            .await?
            .text()
            .await
            .map_err(|err| AppError::Network(format!("{call}: {err}")))
    }
}

#[async_trait]
impl PickupService for HttpBackend {
    async fn pending_pickups(&self) -> Result<Vec<PendingPickup>, AppError> {
        let request = self.client.get(self.pickup_endpoint(&["pending"]));
        Ok(self.send(request, "pending pickups").await?.json().await?)
    }

    async fn mark_in_progress(&self, pickup_id: &str, update: &PickupUpdate) -> Result<(), AppError> {
        let request = self
            .client
            .put(self.pickup_endpoint(&[pickup_id, "progress"]))
            .json(update);
        self.send(request, "mark pickup in progress").await?;
        Ok(())
    }

    async fn eta(&self, pickup_id: &str) -> Result<String, AppError> {
        let request = self.client.get(self.pickup_endpoint(&[pickup_id, "eta"]));
        self.text(request, "pickup eta").await
    }

    async fn report_driver_location(
        &self,
        pickup_id: &str,
        update: &PickupUpdate,
    ) -> Result<(), AppError> {
        let request = self
            .client
            .put(self.pickup_endpoint(&[pickup_id, "dLocation"]))
            .json(update);
        self.send(request, "driver location").await?;
        Ok(())
    }

    async fn complete(&self, pickup_id: &str, update: &PickupUpdate) -> Result<(), AppError> {
        let request = self
            .client
            .put(self.pickup_endpoint(&[pickup_id, "complete"]))
            .json(update);
        self.send(request, "complete pickup").await?;
        Ok(())
    }

    async fn history(&self, user_id: i64) -> Result<Vec<PickupRecord>, AppError> {
        let user_id = user_id.to_string();
        let request = self.client.get(self.pickup_endpoint(&["history", &user_id]));
        Ok(self.send(request, "pickup history").await?.json().await?)
    }
}

#[async_trait]
impl AccountService for HttpBackend {
    async fn user(&self, user_id: i64) -> Result<BackendUser, AppError> {
        let user_id = user_id.to_string();
        let request = self.client.get(self.user_endpoint(&[&user_id]));
        Ok(self.send(request, "user").await?.json().await?)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<BackendUser>, AppError> {
        let response = self
            .client
            .get(self.user_endpoint(&["email", email]))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(AppError::Network(format!("user lookup failed: {status}"))),
        }
    }

    async fn register(&self, registration: &Registration) -> Result<(), AppError> {
        let request = self.client.post(self.user_endpoint(&[])).json(registration);
        self.send(request, "register user").await?;
        Ok(())
    }

    async fn cards(&self, user_id: i64) -> Result<Vec<PaymentCard>, AppError> {
        let user_id = user_id.to_string();
        let request = self
            .client
            .get(self.endpoint(&["api", "cards", "all", &user_id]));
        Ok(self.send(request, "payment cards").await?.json().await?)
    }

    async fn upload_profile_picture(&self, upload: &ProfilePictureUpload) -> Result<(), AppError> {
        let request = self
            .client
            .put(self.user_endpoint(&["profilePicture"]))
            .json(upload);
        self.send(request, "profile picture upload").await?;
        Ok(())
    }

    async fn create_connected_account(&self, user_id: i64) -> Result<String, AppError> {
        let user_id = user_id.to_string();
        let request = self.client.post(self.endpoint(&["api", "stripe", &user_id]));
        self.text(request, "create connected account").await
    }

    async fn onboarding_link(&self, user_id: i64, link: &ConfirmationLink) -> Result<String, AppError> {
        let user_id = user_id.to_string();
        let request = self
            .client
            .put(self.endpoint(&["api", "stripe", &user_id]))
            .json(link);
        self.text(request, "onboarding link").await
    }

    async fn ping(&self) -> Result<u16, AppError> {
        let response = self
            .client
            .request(Method::OPTIONS, self.user_endpoint(&[]))
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{build_client, HttpBackend};

    fn backend(base: &str) -> HttpBackend {
        let client = build_client(Duration::from_secs(1), false).unwrap();
        HttpBackend::new(client, base).unwrap()
    }

    #[test]
    fn endpoints_append_to_the_base_path() {
        let backend = backend("https://localhost:8443");
        assert_eq!(
            backend.pickup_endpoint(&["42", "eta"]).as_str(),
            "https://localhost:8443/api/sgrPickup/42/eta"
        );

        let backend = self::backend("https://example.com/driver/");
        assert_eq!(
            backend.user_endpoint(&[]).as_str(),
            "https://example.com/driver/api/users"
        );
    }

    #[test]
    fn path_segments_are_escaped() {
        let backend = backend("https://localhost:8443");
        assert_eq!(
            backend.user_endpoint(&["email", "a b/c@x.io"]).as_str(),
            "https://localhost:8443/api/users/email/a%20b%2Fc@x.io"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        let client = build_client(Duration::from_secs(1), false).unwrap();
        assert!(HttpBackend::new(client.clone(), "not a url").is_err());
        assert!(HttpBackend::new(client, "mailto:ops@example.com").is_err());
    }
}
