use tracing::{debug, warn};

use crate::codec::raster::decode_to_data_url;

/// Shorter all-hex values are treated as unrecognised text, not image data.
const MIN_HEX_BLOB_LEN: usize = 100;

/// What a stored profile-picture value turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureSource<'a> {
    Inline(&'a str),
    Hex(&'a str),
    Url(&'a str),
    Unknown,
}

pub fn classify(value: &str) -> PictureSource<'_> {
    if value.starts_with("data:image/") {
        PictureSource::Inline(value)
    } else if value.len() > MIN_HEX_BLOB_LEN && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        PictureSource::Hex(value)
    } else if value.starts_with("http") {
        PictureSource::Url(value)
    } else {
        PictureSource::Unknown
    }
}

/// Turns a stored profile-picture field into something displayable, falling
/// back to `fallback` (usually the identity provider's avatar) on anything
/// missing, unrecognised or undecodable.
pub fn resolve_profile_picture(stored: Option<&str>, fallback: &str) -> String {
    let Some(value) = stored.filter(|value| !value.trim().is_empty() && *value != "null") else {
        return fallback.to_string();
    };

    match classify(value) {
        PictureSource::Inline(image) | PictureSource::Url(image) => image.to_string(),
        PictureSource::Hex(blob) => decode_to_data_url(blob).unwrap_or_else(|err| {
            warn!(error = %err, blob_len = blob.len(), "stored profile picture could not be decoded");
            fallback.to_string()
        }),
        PictureSource::Unknown => {
            debug!("stored profile picture format not recognised");
            fallback.to_string()
        }
    }
}
