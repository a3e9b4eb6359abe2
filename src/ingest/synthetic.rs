//! Synthetic camera for `stub://` devices.
//!
//! Renders a static gradient with a bright block that jumps to a new position
//! every `MOVE_EVERY` frames, so a background model sees short bursts of
//! motion separated by still periods.

use std::time::{Duration, Instant};

use super::{FrameSource, SourceStats};
use crate::error::CaptureError;
use crate::frame::Frame;

/// Frames between block moves.
pub const MOVE_EVERY: u64 = 30;

pub struct SyntheticCamera {
    device: String,
    width: u32,
    height: u32,
    frame_count: u64,
    read_failures: u64,
    /// Simulated scene state; the block position derives from it.
    scene_state: u32,
    interval: Duration,
    last_frame_at: Option<Instant>,
    fail_every: Option<u64>,
    attempts: u64,
}

impl SyntheticCamera {
    pub fn new(device: &str, width: u32, height: u32) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::unavailable(
                device,
                format!("invalid geometry {}x{}", width, height),
            ));
        }
        Ok(Self {
            device: device.to_string(),
            width,
            height,
            frame_count: 0,
            read_failures: 0,
            scene_state: 0,
            interval: Duration::ZERO,
            last_frame_at: None,
            fail_every: None,
            attempts: 0,
        })
    }

    /// Pace reads to at most one frame per `interval`.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Make every `n`th read attempt fail, to exercise retry paths.
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    fn render(&mut self) -> Result<Frame, CaptureError> {
        if self.frame_count % MOVE_EVERY == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let (w, h) = (self.width, self.height);
        let block_w = (w / 8).max(1);
        let block_h = (h / 8).max(1);
        let block_x = (self.scene_state.wrapping_mul(7919) % (w - block_w + 1)) as usize;
        let block_y = (self.scene_state.wrapping_mul(104_729) % (h - block_h + 1)) as usize;

        let mut pixels = Vec::with_capacity((w as usize) * (h as usize) * 3);
        for y in 0..h as usize {
            for x in 0..w as usize {
                let in_block = (block_x..block_x + block_w as usize).contains(&x)
                    && (block_y..block_y + block_h as usize).contains(&y);
                let value = if in_block {
                    250
                } else {
                    // Dim gradient background
                    ((x + y) % 64) as u8
                };
                pixels.extend_from_slice(&[value, value, value]);
            }
        }

        Frame::from_rgb(pixels, w, h)
    }
}

impl FrameSource for SyntheticCamera {
    fn device(&self) -> &str {
        &self.device
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        self.pace();
        self.attempts += 1;
        if let Some(n) = self.fail_every {
            if self.attempts % n == 0 {
                self.read_failures += 1;
                return Err(CaptureError::ReadFailed(format!(
                    "{}: simulated dropout",
                    self.device
                )));
            }
        }

        let frame = self.render()?;
        self.frame_count += 1;
        Ok(frame)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            read_failures: self.read_failures,
            device: self.device.clone(),
        }
    }
}
