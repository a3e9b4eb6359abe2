use crate::error::CaptureError;
use crate::frame::{Frame, ForegroundMask};

/// Stateful background model.
///
/// A model adapts over the frame history, so a detector owns exactly one
/// instance for its whole lifetime. Implementations treat the frame as
/// read-only and must not retain it past the call.
pub trait MotionModel: Send {
    /// Model identifier for logging.
    fn name(&self) -> &'static str;

    /// Feed one frame and return its foreground mask.
    fn apply(&mut self, frame: &Frame) -> Result<ForegroundMask, CaptureError>;

    /// Motion score for a frame: the mean of its foreground mask.
    fn score(&mut self, frame: &Frame) -> Result<f64, CaptureError> {
        Ok(self.apply(frame)?.mean())
    }
}
