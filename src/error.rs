//! Error taxonomy shared by the capture and upload sides.
//!
//! Neither side ever observes the other's errors: capture errors stay on the
//! capture thread, transport errors stay inside the uploader.

use thiserror::Error;

/// Errors raised while acquiring, reading, or encoding frames.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The camera could not be opened. Fatal at startup.
    #[error("camera {device} unavailable: {reason}")]
    CameraUnavailable { device: String, reason: String },

    /// A single frame read failed. Transient; the detector retries.
    #[error("frame read failed: {0}")]
    ReadFailed(String),

    /// The frame could not be encoded for writing or upload.
    #[error("frame encode failed: {0}")]
    Encode(String),

    /// Frame or model parameters are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CaptureError {
    pub fn unavailable(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::CameraUnavailable {
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by an upload transport before any HTTP status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to remote server: {0}")]
    Connection(String),
}
