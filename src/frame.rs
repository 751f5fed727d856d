//! Raw still frames.
//!
//! A `Frame` is produced by a capture source, handed to the compressor, and dropped.
//! It is never uploaded, logged, or persisted in raw form.

use image::{GenericImageView, RgbImage};

use crate::error::{Error, Result};

/// Bytes per RGB8 pixel.
const CHANNELS: usize = 3;

/// One raw still image: tightly packed RGB8 pixels plus dimensions.
///
/// There is no `Clone`; a frame has exactly one owner on its way to the compressor.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap packed RGB8 pixels. Fails if the buffer does not match the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::UnsupportedFormat(format!(
                "frame has empty dimensions {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(Error::UnsupportedFormat(format!(
                "frame buffer is {} bytes, expected {} for {}x{} rgb",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode an encoded still (JPEG, PNG) into a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| Error::UnsupportedFormat(format!("decode image: {}", e)))?;
        let (width, height) = image.dimensions();
        let rgb = image.into_rgb8();
        Self::from_rgb(rgb.into_raw(), width, height)
    }

    /// Raw byte length, used for payload size comparisons.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Consume the frame into an `image` buffer for resampling.
    pub(crate) fn into_rgb_image(self) -> Result<RgbImage> {
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width, height, self.data).ok_or_else(|| {
            Error::Encode(format!("frame buffer does not fit {}x{}", width, height))
        })
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel content stays out of debug output.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
