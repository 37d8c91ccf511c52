//! Image encoding: `RgbImage` → base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 data embedded in the JSON request body.
//! The image is re-encoded from the normalised RGB buffer rather than
//! forwarding the fetched bytes, so GIF/WebP/CMYK-JPEG sources reach every
//! provider in a format all of them accept.
//!
//! [`encode_blocking`] caps the longest edge before encoding, so a
//! full-resolution photo never goes out as a multi-megabyte payload.

use crate::pipeline::decode::fit_within;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::RgbImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a normalised image as a base64 PNG ready for the VLM API.
///
/// `detail: "low"` asks GPT-4-class models for a single overview tile. A
/// one-line caption describes the whole scene, so the tiled high-detail
/// budget would only add input tokens.
pub fn encode_image(img: &RgbImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("low"))
}

/// Downscale to `max_edge` and encode, on the blocking thread pool.
pub async fn encode_blocking(img: RgbImage, max_edge: u32) -> Result<ImageData, String> {
    tokio::task::spawn_blocking(move || {
        encode_image(&fit_within(img, max_edge)).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| format!("encode task panicked: {e}"))?
}
