//! Image decoding, the pixel-area floor, RGB normalisation and downscaling.
//!
//! Decoding and resizing are CPU-bound, so [`decode_blocking`] and
//! [`normalise_blocking`] run them on Tokio's blocking pool. The format is sniffed from the bytes rather than trusted from the
//! URL or `Content-Type`, which are frequently wrong on the open web.

use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, RgbImage};
use tracing::debug;

/// A successfully decoded image, before normalisation.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Colour mode as stored in the source file.
    pub fn color(&self) -> ColorType {
        self.image.color()
    }

    /// `width * height`, computed without overflow.
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// `true` when the image is at least `min_area` pixels.
    pub fn meets_area_floor(&self, min_area: u64) -> bool {
        self.area() >= min_area
    }

    /// Convert to 8-bit, 3-channel RGB. Alpha is discarded; palette,
    /// greyscale, and 16-bit inputs are expanded or narrowed.
    pub fn into_rgb(self) -> RgbImage {
        self.image.into_rgb8()
    }
}

/// Downscale `img` so neither edge exceeds `max_edge`, keeping the aspect
/// ratio. Images already within the bound are returned untouched.
pub fn fit_within(img: RgbImage, max_edge: u32) -> RgbImage {
    let max_edge = max_edge.max(1);
    let (width, height) = img.dimensions();
    if width <= max_edge && height <= max_edge {
        return img;
    }

    let scale = f64::from(max_edge) / f64::from(width.max(height));
    let new_width = ((f64::from(width) * scale).round() as u32).clamp(1, max_edge);
    let new_height = ((f64::from(height) * scale).round() as u32).clamp(1, max_edge);
    debug!(
        "Downscaling {}x{} → {}x{}",
        width, height, new_width, new_height
    );
    imageops::resize(&img, new_width, new_height, FilterType::Triangle)
}

/// Decode `bytes` as an image, guessing the format from its magic bytes.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, image::ImageError> {
    let image = image::load_from_memory(bytes)?;
    debug!(
        "Decoded {}x{} image ({:?})",
        image.width(),
        image.height(),
        image.color()
    );
    Ok(DecodedImage::new(image))
}

/// [`decode_image`] on the blocking thread pool.
///
/// The error is flattened to a string: the pipeline only reports it.
pub async fn decode_blocking(bytes: Vec<u8>) -> Result<DecodedImage, String> {
    tokio::task::spawn_blocking(move || decode_image(&bytes).map_err(|e| e.to_string()))
        .await
        .map_err(|e| format!("decode task panicked: {e}"))?
}

/// RGB normalisation plus [`fit_within`] on the blocking thread pool.
pub async fn normalise_blocking(decoded: DecodedImage, max_edge: u32) -> Result<RgbImage, String> {
    tokio::task::spawn_blocking(move || fit_within(decoded.into_rgb(), max_edge))
        .await
        .map_err(|e| format!("normalise task panicked: {e}"))
}
