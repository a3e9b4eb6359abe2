//! Frame ingestion sources.
//!
//! This module provides the camera that feeds the detector:
//! - USB/V4L2 devices (feature: camera-v4l2)
//! - Synthetic `stub://` source (always built; tests and hardware-free runs)
//!
//! All sources produce RGB24 `Frame` instances. A failed read is reported as
//! `CaptureError::ReadFailed` and is transient; the caller decides whether to
//! retry. Failing to open the device is `CaptureError::CameraUnavailable`.

#[cfg(any(feature = "camera-v4l2", test))]
mod normalize;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

use std::time::Duration;

use crate::error::CaptureError;
use crate::frame::Frame;

pub use synthetic::SyntheticCamera;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

/// Device prefix that selects the synthetic camera.
pub const SYNTHETIC_SCHEME: &str = "stub://";

/// Frame pacing for the synthetic camera when opened as a device (~30 fps).
const SYNTHETIC_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// A producer of frames. Owned exclusively by the capture loop.
pub trait FrameSource {
    /// Device identifier for logging.
    fn device(&self) -> &str;

    /// Read the next frame. Blocks until a frame is available or the read fails.
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Capture counters.
    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub read_failures: u64,
    pub device: String,
}

/// Camera selection and requested capture geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    /// Device index; maps to `/dev/video<index>`.
    pub index: u32,
    /// Explicit device path, overrides `index`. `stub://...` selects the synthetic camera.
    pub device: Option<String>,
    /// Requested frame width. The device may settle on a different size.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            device: None,
            width: 1280,
            height: 960,
        }
    }
}

impl CameraSettings {
    pub fn device_path(&self) -> String {
        match &self.device {
            Some(device) => device.clone(),
            None => format!("/dev/video{}", self.index),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.device_path().starts_with(SYNTHETIC_SCHEME)
    }
}

/// The camera behind the detector.
///
/// Uses libv4l for real devices, with a synthetic fallback for `stub://` paths.
pub struct Camera {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    Device(V4l2Camera),
}

impl Camera {
    /// Acquire the camera and apply the requested geometry.
    pub fn open(settings: &CameraSettings) -> Result<Self, CaptureError> {
        let device = settings.device_path();
        if settings.is_synthetic() {
            let camera = SyntheticCamera::new(&device, settings.width, settings.height)?
                .with_interval(SYNTHETIC_FRAME_INTERVAL);
            log::info!(
                "camera: opened {} ({}x{}, synthetic)",
                device,
                settings.width,
                settings.height
            );
            return Ok(Self {
                backend: CameraBackend::Synthetic(camera),
            });
        }

        #[cfg(feature = "camera-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(V4l2Camera::open(settings)?),
            })
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(CaptureError::unavailable(
                device,
                "built without the camera-v4l2 feature",
            ))
        }
    }
}

impl FrameSource for Camera {
    fn device(&self) -> &str {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.device(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.device(),
        }
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.read_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.read_frame(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_path_defaults_to_index() {
        let settings = CameraSettings {
            index: 2,
            ..CameraSettings::default()
        };
        assert_eq!(settings.device_path(), "/dev/video2");
        assert!(!settings.is_synthetic());
    }

    #[test]
    fn opens_synthetic_camera() {
        let settings = CameraSettings {
            device: Some("stub://front".to_string()),
            width: 32,
            height: 24,
            ..CameraSettings::default()
        };
        let mut camera = Camera::open(&settings).unwrap();
        let frame = camera.read_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
        assert_eq!(camera.device(), "stub://front");
        assert_eq!(camera.stats().frames_captured, 1);
    }

    #[cfg(not(feature = "camera-v4l2"))]
    #[test]
    fn missing_device_backend_is_unavailable() {
        let err = Camera::open(&CameraSettings::default()).err().unwrap();
        assert!(matches!(err, CaptureError::CameraUnavailable { .. }));
    }
}
