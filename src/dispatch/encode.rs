use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::error::CaptureError;
use crate::frame::Frame;

/// Default JPEG quality for written and uploaded frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Turns a frame into transmissible bytes.
pub trait FrameEncoder {
    /// File extension without the dot, e.g. `jpg`.
    fn extension(&self) -> &'static str;

    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CaptureError>;
}

/// Baseline JPEG via the `image` crate.
#[derive(Clone, Copy, Debug)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(quality: u8) -> Result<Self, CaptureError> {
        if !(1..=100).contains(&quality) {
            return Err(CaptureError::InvalidConfig(format!(
                "jpeg quality must be within 1..=100, got {}",
                quality
            )));
        }
        Ok(Self { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CaptureError> {
        let mut bytes = Vec::with_capacity(frame.as_rgb().len() / 8);
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode(
                frame.as_rgb(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|err| CaptureError::Encode(err.to_string()))?;
        Ok(bytes)
    }
}
