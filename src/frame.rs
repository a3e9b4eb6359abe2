//! Captured frames and foreground masks.
//!
//! - `Frame`: packed RGB24 pixels plus dimensions. Moved from stage to stage, never shared.
//! - `ForegroundMask`: per-pixel background-subtraction output. Its mean is the motion score.

use crate::error::CaptureError;

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

/// Mask value for pixels classified as foreground.
pub const FOREGROUND: u8 = 255;

/// Mask value for pixels classified as background.
pub const BACKGROUND: u8 = 0;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// A single captured image in packed RGB24 layout.
///
/// There is no `Clone`: a frame has exactly one owner at a time. The capture
/// loop hands it to the detector, which hands it to the dispatcher.
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap an RGB24 buffer. Rejects empty dimensions and length mismatches.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self, CaptureError> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(CaptureError::InvalidConfig(format!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// A frame where every pixel has the same color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, CaptureError> {
        let pixels = rgb_len(width, height)? / RGB_CHANNELS;
        let data = rgb.iter().copied().cycle().take(pixels * RGB_CHANNELS).collect();
        Self::from_rgb(data, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_rgb(&self) -> &[u8] {
        &self.data
    }

    /// Integer BT.601 luma, one byte per pixel.
    pub fn luma(&self) -> Vec<u8> {
        self.data
            .chunks_exact(RGB_CHANNELS)
            .map(|px| {
                let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                ((77 * r + 150 * g + 29 * b) >> 8) as u8
            })
            .collect()
    }

    /// Packed `0RGB` words, the layout window buffers expect.
    pub fn to_0rgb(&self) -> Vec<u32> {
        self.data
            .chunks_exact(RGB_CHANNELS)
            .map(|px| ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32)
            .collect()
    }
}

fn rgb_len(width: u32, height: u32) -> Result<usize, CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::InvalidConfig(format!(
            "frame dimensions must be non-zero, got {}x{}",
            width, height
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| CaptureError::InvalidConfig("frame dimensions overflow".to_string()))
}

// ----------------------------------------------------------------------------
// ForegroundMask
// ----------------------------------------------------------------------------

/// Background-subtraction output, one byte per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForegroundMask {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl ForegroundMask {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, CaptureError> {
        let expected = (width as usize) * (height as usize);
        if expected == 0 || data.len() != expected {
            return Err(CaptureError::InvalidConfig(format!(
                "mask length mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// A mask with every pixel set to `value`.
    pub fn uniform(width: u32, height: u32, value: u8) -> Result<Self, CaptureError> {
        let len = (width as usize) * (height as usize);
        Self::new(vec![value; len], width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mean mask intensity in `[0, 255]`. This is the motion score.
    pub fn mean(&self) -> f64 {
        let sum: u64 = self.data.iter().map(|&v| v as u64).sum();
        sum as f64 / self.data.len() as f64
    }

    pub fn foreground_pixels(&self) -> usize {
        self.data.iter().filter(|&&v| v == FOREGROUND).count()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_length_mismatch() {
        assert!(Frame::from_rgb(vec![0u8; 10], 2, 2).is_err());
        assert!(Frame::from_rgb(vec![0u8; 12], 2, 2).is_ok());
    }

    #[test]
    fn frame_rejects_zero_dimensions() {
        assert!(Frame::from_rgb(Vec::new(), 0, 4).is_err());
        assert!(Frame::filled(4, 0, [1, 2, 3]).is_err());
    }

    #[test]
    fn luma_of_gray_is_identity() {
        let frame = Frame::filled(3, 2, [128, 128, 128]).unwrap();
        let luma = frame.luma();
        assert_eq!(luma.len(), 6);
        assert!(luma.iter().all(|&v| v == 128));
    }

    #[test]
    fn packs_rgb_words() {
        let frame = Frame::from_rgb(vec![0x12, 0x34, 0x56], 1, 1).unwrap();
        assert_eq!(frame.to_0rgb(), vec![0x0012_3456]);
    }

    #[test]
    fn mask_mean_matches_foreground_share() {
        let mut data = vec![BACKGROUND; 100];
        for px in data.iter_mut().take(10) {
            *px = FOREGROUND;
        }
        let mask = ForegroundMask::new(data, 10, 10).unwrap();
        assert_eq!(mask.foreground_pixels(), 10);
        assert!((mask.mean() - 25.5).abs() < 1e-9);
    }

    #[test]
    fn uniform_mask_mean_is_exact() {
        let mask = ForegroundMask::uniform(4, 4, 15).unwrap();
        assert_eq!(mask.mean(), 15.0);
    }
}
