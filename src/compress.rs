//! Frame downsampling and JPEG re-encoding.
//!
//! Keeps upload payloads bounded: the longer side is clamped to
//! `max_dimension` (aspect ratio preserved) and the result is JPEG-encoded at
//! the configured quality. Identical input and settings give identical output.

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::ExtendedColorType;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::frame::Frame;

pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressionSettings {
    /// Maximum output length of the longer side, in pixels.
    pub max_dimension: u32,
    /// Encoder quality factor in (0, 1].
    pub quality: f32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            quality: 0.7,
        }
    }
}

impl CompressionSettings {
    /// Quality mapped onto the JPEG encoder's 1..=100 scale.
    fn jpeg_quality(&self) -> u8 {
        (self.quality.clamp(0.01, 1.0) * 100.0).round() as u8
    }
}

/// Encoded payload ready for upload.
#[derive(Clone, Debug)]
pub struct CompressedImage {
    bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
}

impl CompressedImage {
    pub fn mime_type(&self) -> &'static str {
        JPEG_MIME
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn estimated_size(&self) -> usize {
        self.bytes.len()
    }

    /// `data:image/jpeg;base64,...`, the form the upload endpoint expects.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Short payload fingerprint for logs.
    pub fn digest_hex(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(&digest[..6])
    }
}

/// Output dimensions for a frame, preserving aspect ratio.
///
/// Frames already within bounds keep their size; otherwise both sides are
/// scaled by the same ratio so the longer side equals `max_dimension`.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let ratio = f64::min(
        max_dimension as f64 / width as f64,
        max_dimension as f64 / height as f64,
    );
    let scaled = |side: u32| ((side as f64 * ratio).round() as u32).clamp(1, max_dimension);
    (scaled(width), scaled(height))
}

/// Downsample and re-encode a frame.
pub fn compress(frame: Frame, settings: &CompressionSettings) -> Result<CompressedImage> {
    let source_bytes = frame.byte_len();
    let (width, height) = target_dimensions(frame.width, frame.height, settings.max_dimension);
    let mut image = frame.into_rgb_image()?;
    if (width, height) != image.dimensions() {
        image = imageops::resize(&image, width, height, FilterType::Triangle);
    }

    let mut bytes = Vec::with_capacity(width as usize * height as usize / 4);
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, settings.jpeg_quality());
    encoder
        .encode(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| Error::Encode(format!("jpeg encode {}x{}: {}", width, height, e)))?;

    log::debug!(
        "compressed {} raw bytes to {}x{} jpeg ({} bytes, q={:.2})",
        source_bytes,
        width,
        height,
        bytes.len(),
        settings.quality
    );

    Ok(CompressedImage {
        bytes,
        width,
        height,
        quality: settings.quality,
    })
}
