//! Threshold detector.
//!
//! The detector owns the camera and the background model. It reads frames,
//! scores them, and yields the ones whose score meets the threshold as a
//! lazy, cancellable sequence.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::CaptureConfig;
use crate::detect::model::MotionModel;
use crate::detect::result::DetectionResult;
use crate::detect::subtractor::BackgroundSubtractor;
use crate::error::CaptureError;
use crate::ingest::{Camera, CameraSettings, FrameSource, SourceStats};
use crate::shutdown::Shutdown;

/// Interval between health log lines from the capture loop.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Running counters for a detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub frames_read: u64,
    pub read_failures: u64,
    pub model_failures: u64,
    pub detections: u64,
}

pub struct Detector {
    camera: CameraSettings,
    threshold: f64,
    source: Box<dyn FrameSource>,
    model: Box<dyn MotionModel>,
    stats: DetectorStats,
    last_health_log: Instant,
}

impl Detector {
    /// Acquire the configured camera and a fresh background model.
    ///
    /// Fails with `CaptureError::CameraUnavailable` when the device cannot be opened.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let source = Camera::open(&config.camera)?;
        let mut detector = Self::new(
            config.threshold,
            Box::new(source),
            Box::new(BackgroundSubtractor::default()),
        )?;
        detector.camera = config.camera.clone();
        Ok(detector)
    }

    /// Assemble a detector from an already-open source and model.
    pub fn new(
        threshold: f64,
        source: Box<dyn FrameSource>,
        model: Box<dyn MotionModel>,
    ) -> Result<Self, CaptureError> {
        validate_threshold(threshold)?;
        let camera = CameraSettings {
            device: Some(source.device().to_string()),
            ..CameraSettings::default()
        };
        Ok(Self {
            camera,
            threshold,
            source,
            model,
            stats: DetectorStats::default(),
            last_health_log: Instant::now(),
        })
    }

    pub fn camera(&self) -> &CameraSettings {
        &self.camera
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats
    }

    /// Turn the detector into its detection sequence.
    ///
    /// The sequence is infinite until `shutdown` is triggered and cannot be
    /// restarted: the detector moves into it.
    pub fn produce(self, shutdown: Shutdown) -> Detections {
        log::info!(
            "running motion detection with threshold {:.2} (model: {})",
            self.threshold,
            self.model.name()
        );
        Detections {
            detector: self,
            shutdown,
        }
    }

    /// One read-score-compare step. `None` means the frame was dropped.
    fn step(&mut self) -> Option<DetectionResult> {
        let frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.read_failures += 1;
                log::debug!("no image from camera ({}); retrying", err);
                return None;
            }
        };
        self.stats.frames_read += 1;

        log::debug!("checking motion value...");
        let score = match self.model.score(&frame) {
            Ok(score) => score,
            Err(err) => {
                self.stats.model_failures += 1;
                log::warn!("motion model rejected frame: {}", err);
                return None;
            }
        };

        if score >= self.threshold {
            self.stats.detections += 1;
            log::info!("detected motion with value {:.3}", score);
            Some(DetectionResult::new(frame, score, self.stats.frames_read))
        } else {
            log::debug!("motion not detected ({:.3} < {:.3})", score, self.threshold);
            None
        }
    }

    fn maybe_log_health(&mut self) {
        if self.last_health_log.elapsed() < HEALTH_LOG_INTERVAL {
            return;
        }
        log::info!("{}", health_line(&self.source.stats(), &self.stats));
        self.last_health_log = Instant::now();
    }
}

fn health_line(source: &SourceStats, stats: &DetectorStats) -> String {
    format!(
        "camera health: device={} captured={} read_failures={} model_failures={} detections={}",
        source.device,
        source.frames_captured,
        stats.read_failures,
        stats.model_failures,
        stats.detections
    )
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("device", &self.camera.device_path())
            .field("width", &self.camera.width)
            .field("height", &self.camera.height)
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// Lazy sequence of detections. Ends only when shutdown is triggered.
pub struct Detections {
    detector: Detector,
    shutdown: Shutdown,
}

impl Detections {
    pub fn stats(&self) -> DetectorStats {
        self.detector.stats()
    }
}

impl Iterator for Detections {
    type Item = DetectionResult;

    fn next(&mut self) -> Option<DetectionResult> {
        loop {
            if self.shutdown.is_triggered() {
                log::info!("motion detection stopped");
                return None;
            }
            let detection = self.detector.step();
            self.detector.maybe_log_health();
            if detection.is_some() {
                return detection;
            }
        }
    }
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<(), CaptureError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(CaptureError::InvalidConfig(format!(
            "threshold must be a finite number >= 0, got {}",
            threshold
        )));
    }
    Ok(())
}
