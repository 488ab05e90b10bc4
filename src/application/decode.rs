//! Decode-before-display port.
//!
//! A background is only cached once its pixels are decoded, so a view can
//! cross-fade to it without waiting on the network or the decoder.

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;

use crate::domain::media::MediaItem;

/// Decoded pixels of a background, cheap to clone.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// A transparent image of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbaImage::new(width, height))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid image url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("failed to fetch `{url}`: {message}")]
    Fetch { url: String, message: String },
    #[error("fetching `{url}` returned status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode `{url}`: {message}")]
    Decode { url: String, message: String },
    #[error("decode task aborted: {0}")]
    Aborted(String),
}

#[async_trait]
pub trait ImageDecoder: Send + Sync {
    async fn decode(&self, media: &MediaItem) -> Result<DecodedImage, DecodeError>;
}
