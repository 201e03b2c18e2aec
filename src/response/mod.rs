//! Response encoding for generated images

pub mod base64;

use std::str::FromStr;

use crate::backend::traits::GeneratedImage;
use crate::error::{AppError, Result};

/// How images are encoded in API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Bare base64 string
    #[default]
    Base64,
    /// `data:image/<format>;base64,...` URL
    DataUrl,
}

impl FromStr for ResponseFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "base64" | "b64_json" => Ok(Self::Base64),
            "data_url" | "dataurl" => Ok(Self::DataUrl),
            other => Err(AppError::InvalidRequest(format!(
                "Unknown response_format '{}'. Must be 'base64' or 'data_url'",
                other
            ))),
        }
    }
}

/// Encode a generated image for the wire
pub fn encode_image(image: &GeneratedImage, format: ResponseFormat) -> String {
    match format {
        ResponseFormat::Base64 => base64::encode(&image.data),
        ResponseFormat::DataUrl => {
            base64::create_data_url(&image.data, image.format().unwrap_or("png"))
        }
    }
}

/// Encode a batch of images
pub fn encode_images(images: &[GeneratedImage], format: ResponseFormat) -> Vec<String> {
    images.iter().map(|image| encode_image(image, format)).collect()
}

/// Detect image format from binary data using magic bytes
pub fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpeg");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }

    None
}
