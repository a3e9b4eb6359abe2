//! V4L2 camera.
//!
//! `V4l2Camera` opens a local device node (e.g., /dev/video0), negotiates the
//! requested geometry, and streams frames through a memory-mapped buffer
//! queue. Frames are converted to RGB24 before they leave this module.

use ouroboros::self_referencing;
use super::normalize::{to_frame, PixelFormat};
use super::{CameraSettings, FrameSource, SourceStats};
use crate::error::CaptureError;
use crate::frame::Frame;

/// Buffers in the mmap queue.
const STREAM_BUFFERS: u32 = 4;

pub struct V4l2Camera {
    device: String,
    state: DeviceState,
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
    read_failures: u64,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub fn open(settings: &CameraSettings) -> Result<Self, CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = settings.device_path();
        let unavailable = |reason: String| CaptureError::unavailable(path.clone(), reason);

        let mut device = v4l::Device::with_path(&path)
            .map_err(|err| unavailable(format!("open device: {}", err)))?;
        let mut format = device
            .format()
            .map_err(|err| unavailable(format!("read format: {}", err)))?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        // Many webcams refuse RGB3 and settle on YUYV or MJPG instead.
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("camera: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .map_err(|err| unavailable(format!("read format after set failure: {}", err)))?
            }
        };

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            unavailable(format!("unsupported pixel format {}", format.fourcc))
        })?;

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
            },
        }
        .try_build()
        .map_err(|err| unavailable(format!("create buffer stream: {}", err)))?;

        if (format.width, format.height) != (settings.width, settings.height) {
            log::warn!(
                "camera: {} requested {}x{}, device chose {}x{}",
                path,
                settings.width,
                settings.height,
                format.width,
                format.height
            );
        }
        log::info!(
            "camera: opened {} ({}x{}, {:?})",
            path,
            format.width,
            format.height,
            pixel_format
        );

        Ok(Self {
            device: path,
            state,
            format: pixel_format,
            width: format.width,
            height: format.height,
            frame_count: 0,
            read_failures: 0,
        })
    }
}

impl FrameSource for V4l2Camera {
    fn device(&self) -> &str {
        &self.device
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.width, self.height, self.format);
        let result = self.state.with_stream_mut(|stream| match stream.next() {
            Ok((buf, meta)) => {
                let used = (meta.bytesused as usize).min(buf.len());
                let used = if used == 0 { buf.len() } else { used };
                to_frame(&buf[..used], width, height, format)
            }
            Err(err) => Err(CaptureError::ReadFailed(format!("dequeue buffer: {}", err))),
        });

        match result {
            Ok(frame) => {
                self.frame_count += 1;
                Ok(frame)
            }
            Err(err) => {
                self.read_failures += 1;
                Err(err)
            }
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            read_failures: self.read_failures,
            device: self.device.clone(),
        }
    }
}
