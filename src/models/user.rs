use serde::{Deserialize, Serialize};

pub const DEFAULT_RATING: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub profile_picture: String,
    pub rating: f64,
    pub first_name: String,
    pub last_name: String,
    pub connected_account: String,
}

impl User {
    /// Builds the in-memory profile from a backend record. `picture` is the
    /// already-resolved displayable picture.
    pub fn from_backend(record: BackendUser, picture: String) -> Self {
        Self {
            id: record.id,
            email: record.email,
            profile_picture: picture,
            rating: record.rating.unwrap_or(DEFAULT_RATING),
            first_name: record.first_name,
            last_name: record.last_name,
            connected_account: record.connected_account.unwrap_or_default(),
        }
    }

    /// Id 0 marks a placeholder profile that has not been loaded from the backend.
    pub fn is_loaded(&self) -> bool {
        self.id != 0
    }
}

/// The backend's user record; most fields may be absent or null.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUser {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    pub profile_picture: Option<String>,
    pub rating: Option<f64>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub connected_account: Option<String>,
}

/// Claims handed over by the identity provider after login.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePictureUpload {
    pub user_id: i64,
    #[serde(rename = "incriptedImmage")]
    pub encoded_image: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationLink {
    pub return_url: String,
    pub refresh_url: String,
}

impl Default for ConfirmationLink {
    fn default() -> Self {
        let url = "https://connect.stripe.com/hosted/setup/c/complete".to_string();
        Self {
            return_url: url.clone(),
            refresh_url: url,
        }
    }
}
