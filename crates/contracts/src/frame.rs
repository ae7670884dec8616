//! Frame - one decoded camera image
//!
//! Pixels are always tightly packed RGB8. Sources that decode BGR convert
//! before constructing a `Frame`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// A captured frame plus its capture timestamp.
///
/// The pixel buffer is reference counted, so cloning a frame to hand the
/// same capture to the preview path and the analysis path is cheap. Nothing
/// mutates `pixels` after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Bytes,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Build a frame, checking that the buffer holds `width * height * 3` bytes.
    pub fn new(
        width: u32,
        height: u32,
        pixels: impl Into<Bytes>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, ContractError> {
        let pixels = pixels.into();
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(ContractError::invalid_frame(format!(
                "{width}x{height} RGB8 needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            captured_at,
        })
    }

    /// All-black placeholder published while a camera is disconnected.
    pub fn black(width: u32, height: u32, captured_at: DateTime<Utc>) -> Self {
        Self {
            width,
            height,
            pixels: Bytes::from(vec![0u8; width as usize * height as usize * 3]),
            captured_at,
        }
    }

    pub fn from_image(image: RgbImage, captured_at: DateTime<Utc>) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: Bytes::from(image.into_raw()),
            captured_at,
        }
    }

    /// Copy the pixels into an owned `RgbImage` for processing.
    pub fn to_image(&self) -> Result<RgbImage, ContractError> {
        RgbImage::from_raw(self.width, self.height, self.pixels.to_vec())
            .ok_or_else(|| ContractError::invalid_frame("pixel buffer shorter than dimensions"))
    }

    pub fn is_black(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }
}
