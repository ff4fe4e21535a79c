//! Decoded frames handed from ingestion to detection.
//!
//! A `Frame` owns RGB8 pixels for a single image or a single sampled video
//! frame. Frames are produced per upload and dropped once detection is done;
//! nothing here is persisted.

use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbImage};

/// One decoded RGB8 frame.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position of the frame within its source (0 for still images).
    pub index: u64,
}

impl Frame {
    /// Build a frame from tightly packed RGB8 bytes.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{} frame, received {}",
                expected_len,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            index,
        })
    }

    pub fn from_image(image: DynamicImage, index: u64) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            pixels: rgb.into_raw(),
            width,
            height,
            index,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy the frame into an `image` buffer for resizing.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("index", &self.index)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
