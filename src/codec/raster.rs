use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use tracing::debug;

use crate::codec::hex::{decode_hex, encode_hex, PixelBuffer};
use crate::error::AppError;

pub const MAX_SIDE: u32 = 200;
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// Base64 length of the largest accepted upload.
pub const MAX_ENCODED_UPLOAD_BYTES: usize = MAX_UPLOAD_BYTES.div_ceil(3) * 4;
pub const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone)]
pub struct EncodedPicture {
    /// Transport form for the backend's profile-picture field.
    pub hex: String,
    /// JPEG data URL of the same resized image, for immediate local display.
    pub preview: String,
    pub width: u32,
    pub height: u32,
}

/// Scales `(width, height)` so the longer side is at most `max_side`, keeping
/// the aspect ratio. Images already within bounds keep their size.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    if width <= max_side && height <= max_side {
        return (width, height);
    }

    if width > height {
        (max_side, scale(height, max_side, width))
    } else {
        (scale(width, max_side, height), max_side)
    }
}

fn scale(short: u32, max_side: u32, long: u32) -> u32 {
    let scaled = u64::from(short) * u64::from(max_side) / u64::from(long);
    scaled.max(1) as u32
}

/// Validates an uploaded file and produces its hex transport form plus a preview.
pub fn encode_upload(bytes: &[u8], content_type: &str) -> Result<EncodedPicture, AppError> {
    if !content_type.starts_with("image/") {
        return Err(AppError::Validation(
            "please select a valid image file".to_string(),
        ));
    }

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation(
            "image size must be less than 5MB".to_string(),
        ));
    }

    let source = image::load_from_memory(bytes)
        .map_err(|err| AppError::Validation(format!("could not read image: {err}")))?;

    let (width, height) = fit_within(source.width(), source.height(), MAX_SIDE);
    let resized = if (width, height) == (source.width(), source.height()) {
        source
    } else {
        source.resize_exact(width, height, FilterType::Triangle)
    };

    let rgb = resized.to_rgb8();
    let hex = encode_hex(&PixelBuffer::new(rgb.as_raw().clone()));
    let preview = jpeg_data_url(&rgb)?;

    debug!(width, height, hex_len = hex.len(), "image converted to hex");

    Ok(EncodedPicture {
        hex,
        preview,
        width,
        height,
    })
}

/// Rebuilds a stored hex blob as a square JPEG data URL.
pub fn decode_to_data_url(blob: &str) -> Result<String, AppError> {
    let buffer = decode_hex(blob)?;
    let (side, rgb) = buffer.square();
    if side == 0 {
        return Err(AppError::Format(format!(
            "{} bytes is not enough for a single pixel",
            buffer.as_bytes().len()
        )));
    }

    let side = u32::try_from(side)
        .map_err(|_| AppError::Format(format!("image side {side} is too large")))?;
    let image = RgbImage::from_raw(side, side, rgb.to_vec())
        .ok_or_else(|| AppError::Format("pixel buffer does not match its dimensions".to_string()))?;

    jpeg_data_url(&image)
}

fn jpeg_data_url(image: &RgbImage) -> Result<String, AppError> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|err| AppError::Internal(format!("jpeg encoding failed: {err}")))?;

    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)))
}
