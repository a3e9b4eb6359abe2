mod detector;
mod model;
mod result;
mod subtractor;

pub(crate) use detector::validate_threshold;
pub use detector::{Detections, Detector, DetectorStats};
pub use model::MotionModel;
pub use result::DetectionResult;
pub use subtractor::{BackgroundSubtractor, SubtractorParams};
