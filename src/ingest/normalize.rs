use crate::error::CaptureError;
use crate::frame::Frame;

/// Pixel layouts a capture device may settle on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
    Mjpeg,
}

impl PixelFormat {
    /// Map a V4L2 fourcc to a supported layout.
    #[cfg_attr(not(feature = "camera-v4l2"), allow(dead_code))]
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }
}

/// Convert a raw device buffer to an RGB24 frame.
pub(crate) fn to_frame(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Frame, CaptureError> {
    match format {
        PixelFormat::Rgb24 => Frame::from_rgb(pixels.to_vec(), width, height),
        PixelFormat::Yuyv => Frame::from_rgb(yuyv_to_rgb(pixels, width, height)?, width, height),
        PixelFormat::Mjpeg => {
            // Drivers report the negotiated size; the JPEG header is authoritative.
            let image = image::load_from_memory_with_format(pixels, image::ImageFormat::Jpeg)
                .map_err(|err| CaptureError::ReadFailed(format!("decode mjpeg frame: {}", err)))?
                .to_rgb8();
            let (w, h) = image.dimensions();
            Frame::from_rgb(image.into_raw(), w, h)
        }
    }
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CaptureError> {
    let w = width as usize;
    let h = height as usize;
    let expected = w
        .checked_mul(h)
        .and_then(|v| v.checked_mul(2))
        .ok_or_else(|| CaptureError::ReadFailed("YUYV frame dimensions overflow".to_string()))?;
    if w % 2 != 0 || pixels.len() < expected {
        return Err(CaptureError::ReadFailed(format!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        )));
    }

    let mut rgb = Vec::with_capacity(w * h * 3);
    for quad in pixels[..expected].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        for y in [quad[0], quad[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_conversion_produces_gray() -> Result<(), CaptureError> {
        let yuyv = vec![128u8; 2 * 2 * 2];
        let frame = to_frame(&yuyv, 2, 2, PixelFormat::Yuyv)?;
        assert_eq!(frame.as_rgb(), &[128u8; 12][..]);
        Ok(())
    }

    #[test]
    fn yuyv_rejects_short_buffer() {
        assert!(to_frame(&[0u8; 6], 2, 2, PixelFormat::Yuyv).is_err());
    }

    #[test]
    fn rgb_pass_through_validates_length() -> Result<(), CaptureError> {
        let pixels = vec![1u8; 9];
        let frame = to_frame(&pixels, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(frame.as_rgb(), &pixels[..]);
        assert!(to_frame(&pixels, 2, 3, PixelFormat::Rgb24).is_err());
        Ok(())
    }

    #[test]
    fn mjpeg_decodes_with_header_dimensions() -> Result<(), CaptureError> {
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut jpeg)
            .encode(&[200u8; 4 * 2 * 3], 4, 2, image::ExtendedColorType::Rgb8)
            .unwrap();
        let frame = to_frame(&jpeg, 640, 480, PixelFormat::Mjpeg)?;
        assert_eq!((frame.width(), frame.height()), (4, 2));
        Ok(())
    }

    #[test]
    fn maps_known_fourccs() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"NV12"), None);
    }
}
