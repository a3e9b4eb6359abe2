//! Webcam motion capture.
//!
//! Reads frames from a camera, scores each one with an adaptive background
//! model, and fans frames whose score meets a threshold out to a preview
//! window, the filesystem, and a background HTTP uploader.
//!
//! # Architecture
//!
//! ```text
//! FrameSource -> Detector (score >= threshold) -> Dispatcher -> UploadQueue -> Uploader
//! ```
//!
//! The capture side (camera, background model, dispatcher) runs on one thread;
//! the uploader runs on another. The upload queue is the only thing they share,
//! and neither side ever observes the other's errors.
//!
//! # Module Structure
//!
//! - `frame`: RGB frames and foreground masks
//! - `ingest`: Frame sources (V4L2, synthetic)
//! - `detect`: Motion model and threshold detector
//! - `dispatch`: Show / write / send fan-out
//! - `upload`: Upload queue, HTTP transport, uploader thread
//! - `config`: Configuration from file, environment, and command line
//! - Core types: capture ids (`EventClock`)

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};

pub mod config;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod shutdown;
pub mod upload;

pub use config::{CaptureConfig, ConfigOverrides};
pub use detect::{
    BackgroundSubtractor, DetectionResult, Detections, Detector, DetectorStats, MotionModel,
};
pub use dispatch::{ActionOutcome, Actions, DispatchReport, Dispatcher, FrameEncoder, Preview};
pub use error::{CaptureError, TransportError};
pub use frame::{ForegroundMask, Frame};
pub use ingest::{Camera, CameraSettings, FrameSource, SyntheticCamera};
pub use shutdown::Shutdown;
pub use upload::{
    spawn_uploader, upload_queue, HttpTransport, Transport, UploadJob, UploadOutcome,
    UploadReceiver, UploadSender, UploadStats, Uploader, UploaderHandle,
};

// -------------------- Capture ids --------------------

/// `strftime` layout of capture ids: local time with millisecond precision.
pub const CAPTURE_ID_FORMAT: &str = "%Y-%m-%d_%H:%M:%S%.3f";

/// Render a capture id, e.g. `2017-03-01_01:01:01.025`.
pub fn format_capture_id(at: &NaiveDateTime) -> String {
    at.format(CAPTURE_ID_FORMAT).to_string()
}

/// Capture id for the current local time.
pub fn capture_id_now() -> String {
    format_capture_id(&Local::now().naive_local())
}

/// Issues strictly increasing millisecond capture ids.
///
/// Two detections inside the same millisecond would otherwise share a
/// filename; the later one is pushed forward by 1 ms instead.
#[derive(Clone, Debug, Default)]
pub struct EventClock {
    last: Option<NaiveDateTime>,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.next_id_at(Local::now().naive_local())
    }

    pub fn next_id_at(&mut self, now: NaiveDateTime) -> String {
        let mut at = truncate_to_millis(now);
        if let Some(last) = self.last {
            if at <= last {
                at = last + TimeDelta::milliseconds(1);
            }
        }
        self.last = Some(at);
        format_capture_id(&at)
    }
}

fn truncate_to_millis(at: NaiveDateTime) -> NaiveDateTime {
    let millis = at.nanosecond() / 1_000_000;
    at.with_nanosecond(millis * 1_000_000).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(micros: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 3, 1)
            .unwrap()
            .and_hms_micro_opt(1, 1, 1, micros)
            .unwrap()
    }

    #[test]
    fn formats_capture_id_with_millis() {
        assert_eq!(format_capture_id(&at(25_000)), "2017-03-01_01:01:01.025");
    }

    #[test]
    fn capture_id_truncates_sub_millis() {
        let mut clock = EventClock::new();
        assert_eq!(clock.next_id_at(at(25_999)), "2017-03-01_01:01:01.025");
    }

    #[test]
    fn same_millisecond_ids_stay_unique() {
        let mut clock = EventClock::new();
        let a = clock.next_id_at(at(25_000));
        let b = clock.next_id_at(at(25_400));
        let c = clock.next_id_at(at(25_100));
        assert_eq!(a, "2017-03-01_01:01:01.025");
        assert_eq!(b, "2017-03-01_01:01:01.026");
        assert_eq!(c, "2017-03-01_01:01:01.027");
    }

    #[test]
    fn later_instants_pass_through() {
        let mut clock = EventClock::new();
        clock.next_id_at(at(25_000));
        assert_eq!(clock.next_id_at(at(500_000)), "2017-03-01_01:01:01.500");
    }

    #[test]
    fn capture_id_now_has_expected_shape() {
        let id = capture_id_now();
        assert_eq!(id.len(), "2017-03-01_01:01:01.025".len());
        assert_eq!(&id[10..11], "_");
    }
}
