use crate::frame::Frame;

/// A frame whose motion score cleared the detector threshold.
///
/// Immutable once created and consumed exactly once by the dispatcher.
#[derive(Debug)]
pub struct DetectionResult {
    frame: Frame,
    score: f64,
    /// 1-based position of the frame among successful camera reads.
    sequence: u64,
}

impl DetectionResult {
    pub fn new(frame: Frame, score: f64, sequence: u64) -> Self {
        Self {
            frame,
            score,
            sequence,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn into_frame(self) -> Frame {
        self.frame
    }
}
