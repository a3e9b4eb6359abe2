//! Detection fan-out.
//!
//! For each detection the dispatcher runs the enabled subset of
//! show / write / send. The actions are independent: a failure in one is
//! logged and never prevents the others.

mod encode;
mod preview;

use std::path::PathBuf;

use crate::detect::DetectionResult;
use crate::error::CaptureError;
use crate::frame::Frame;
use crate::upload::{UploadJob, UploadSender};
use crate::EventClock;

pub use encode::{FrameEncoder, JpegFrameEncoder, DEFAULT_JPEG_QUALITY};
#[cfg(feature = "preview")]
pub use preview::WindowPreview;
pub use preview::{Preview, SHOW_DURATION};

/// Which actions run for each detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Actions {
    pub show: bool,
    pub write: bool,
    pub send: bool,
}

impl Actions {
    pub fn any(&self) -> bool {
        self.show || self.write || self.send
    }
}

/// Result of one action for one detection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Action disabled.
    Skipped,
    Done,
    Failed(String),
}

impl ActionOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Per-action outcomes for one detection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    pub capture_id: String,
    pub show: ActionOutcome,
    pub write: ActionOutcome,
    pub send: ActionOutcome,
}

pub struct Dispatcher {
    actions: Actions,
    output_dir: PathBuf,
    url: String,
    encoder: Box<dyn FrameEncoder>,
    preview: Option<Box<dyn Preview>>,
    uploads: Option<UploadSender>,
    clock: EventClock,
}

impl Dispatcher {
    pub fn new(actions: Actions, output_dir: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            actions,
            output_dir: output_dir.into(),
            url: url.into(),
            encoder: Box::new(JpegFrameEncoder::default()),
            preview: None,
            uploads: None,
            clock: EventClock::new(),
        }
    }

    pub fn with_encoder(mut self, encoder: Box<dyn FrameEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_preview(mut self, preview: Box<dyn Preview>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_uploads(mut self, uploads: UploadSender) -> Self {
        self.uploads = Some(uploads);
        self
    }

    /// Fan a detection out under a fresh capture id.
    pub fn dispatch(&mut self, detection: DetectionResult) -> DispatchReport {
        let capture_id = self.clock.next_id();
        self.dispatch_as(detection, capture_id)
    }

    /// Fan a detection out under a caller-chosen capture id.
    pub fn dispatch_as(&mut self, detection: DetectionResult, capture_id: String) -> DispatchReport {
        let frame = detection.into_frame();
        let filename = format!("{}.{}", capture_id, self.encoder.extension());

        let show = if self.actions.show {
            self.show(&frame)
        } else {
            ActionOutcome::Skipped
        };

        // Encoded at most once, shared by write and send.
        let encoded = if self.actions.write || self.actions.send {
            Some(self.encoder.encode(&frame))
        } else {
            None
        };
        if let Some(Err(err)) = &encoded {
            log::error!("could not encode image {}: {}", filename, err);
        }

        let write = match (&encoded, self.actions.write) {
            (Some(bytes), true) => self.write(bytes, &filename),
            _ => ActionOutcome::Skipped,
        };
        let send = match (encoded, self.actions.send) {
            (Some(bytes), true) => self.send(bytes, &filename),
            _ => ActionOutcome::Skipped,
        };

        DispatchReport {
            capture_id,
            show,
            write,
            send,
        }
    }

    fn show(&mut self, frame: &Frame) -> ActionOutcome {
        let Some(preview) = self.preview.as_mut() else {
            return ActionOutcome::Failed("no preview configured".to_string());
        };
        match preview.show(frame) {
            Ok(()) => ActionOutcome::Done,
            Err(err) => {
                log::warn!("could not show frame: {}", err);
                ActionOutcome::Failed(err.to_string())
            }
        }
    }

    fn write(&self, encoded: &Result<Vec<u8>, CaptureError>, filename: &str) -> ActionOutcome {
        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(err) => return ActionOutcome::Failed(err.to_string()),
        };
        let path = self.output_dir.join(filename);
        match std::fs::write(&path, bytes) {
            Ok(()) => {
                log::debug!("wrote {}", path.display());
                ActionOutcome::Done
            }
            Err(err) => {
                log::error!("could not write {}: {}", path.display(), err);
                ActionOutcome::Failed(err.to_string())
            }
        }
    }

    fn send(&self, encoded: Result<Vec<u8>, CaptureError>, filename: &str) -> ActionOutcome {
        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(err) => return ActionOutcome::Failed(err.to_string()),
        };
        let Some(uploads) = &self.uploads else {
            log::warn!("send enabled without an upload queue; dropping {}", filename);
            return ActionOutcome::Failed("no upload queue".to_string());
        };
        let job = UploadJob {
            url: self.url.clone(),
            bytes,
            filename: filename.to_string(),
        };
        match uploads.push(job) {
            Ok(()) => ActionOutcome::Done,
            Err(job) => {
                log::error!("uploader gone; dropping {}", job.filename);
                ActionOutcome::Failed("upload queue closed".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{upload_queue, Pop};
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};

    struct FailingEncoder;

    impl FrameEncoder for FailingEncoder {
        fn extension(&self) -> &'static str {
            "jpg"
        }

        fn encode(&self, _frame: &Frame) -> Result<Vec<u8>, CaptureError> {
            Err(CaptureError::Encode("unsupported".to_string()))
        }
    }

    struct RecordingPreview {
        shown: Arc<Mutex<Vec<(u32, u32)>>>,
        fail: bool,
    }

    impl Preview for RecordingPreview {
        fn show(&mut self, frame: &Frame) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow!("display unavailable"));
            }
            self.shown.lock().unwrap().push((frame.width(), frame.height()));
            Ok(())
        }
    }

    fn detection() -> DetectionResult {
        DetectionResult::new(Frame::filled(8, 6, [90, 90, 90]).unwrap(), 42.0, 1)
    }

    #[test]
    fn disabled_actions_are_skipped() {
        let mut dispatcher = Dispatcher::new(Actions::default(), ".", "http://x/");
        let report = dispatcher.dispatch_as(detection(), "id".to_string());
        assert_eq!(report.show, ActionOutcome::Skipped);
        assert_eq!(report.write, ActionOutcome::Skipped);
        assert_eq!(report.send, ActionOutcome::Skipped);
    }

    #[test]
    fn send_enqueues_named_job() {
        let (tx, rx) = upload_queue();
        let actions = Actions {
            send: true,
            ..Actions::default()
        };
        let mut dispatcher = Dispatcher::new(actions, ".", "http://x/").with_uploads(tx);
        let report = dispatcher.dispatch_as(detection(), "2017-03-01_01:01:01.025".to_string());
        assert!(report.send.is_done());

        let Pop::Job(job) = rx.try_pop() else {
            panic!("expected a queued job");
        };
        assert_eq!(job.url, "http://x/");
        assert_eq!(job.filename, "2017-03-01_01:01:01.025.jpg");
        assert_eq!(&job.bytes[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn encode_failure_skips_enqueue() {
        let (tx, rx) = upload_queue();
        let actions = Actions {
            write: true,
            send: true,
            ..Actions::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = Dispatcher::new(actions, dir.path(), "http://x/")
            .with_encoder(Box::new(FailingEncoder))
            .with_uploads(tx);
        let report = dispatcher.dispatch_as(detection(), "id".to_string());

        assert!(matches!(report.send, ActionOutcome::Failed(_)));
        assert!(matches!(report.write, ActionOutcome::Failed(_)));
        assert_eq!(rx.try_pop(), Pop::Empty);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn write_failure_does_not_block_send() {
        let (tx, rx) = upload_queue();
        let actions = Actions {
            write: true,
            send: true,
            ..Actions::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let mut dispatcher = Dispatcher::new(actions, &missing, "http://x/").with_uploads(tx);
        let report = dispatcher.dispatch_as(detection(), "id".to_string());

        assert!(matches!(report.write, ActionOutcome::Failed(_)));
        assert!(report.send.is_done());
        assert!(matches!(rx.try_pop(), Pop::Job(_)));
    }

    #[test]
    fn preview_failure_does_not_block_write() {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let actions = Actions {
            show: true,
            write: true,
            ..Actions::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = Dispatcher::new(actions, dir.path(), "http://x/").with_preview(
            Box::new(RecordingPreview {
                shown: shown.clone(),
                fail: true,
            }),
        );
        let report = dispatcher.dispatch_as(detection(), "id".to_string());

        assert!(matches!(report.show, ActionOutcome::Failed(_)));
        assert!(report.write.is_done());
        assert!(dir.path().join("id.jpg").exists());
    }

    #[test]
    fn show_renders_frame() {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let actions = Actions {
            show: true,
            ..Actions::default()
        };
        let mut dispatcher = Dispatcher::new(actions, ".", "http://x/").with_preview(Box::new(
            RecordingPreview {
                shown: shown.clone(),
                fail: false,
            },
        ));
        assert!(dispatcher.dispatch(detection()).show.is_done());
        assert_eq!(*shown.lock().unwrap(), vec![(8, 6)]);
    }

    #[test]
    fn capture_ids_are_unique() {
        let mut dispatcher = Dispatcher::new(Actions::default(), ".", "http://x/");
        let a = dispatcher.dispatch(detection()).capture_id;
        let b = dispatcher.dispatch(detection()).capture_id;
        assert!(b > a);
    }
}
