use std::time::Duration;

use super::multipart::MultipartBody;
use super::UploadJob;
use crate::error::TransportError;

/// Content type of uploaded frames.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Delivers one upload job and reports the HTTP status.
///
/// Any status, including non-2xx, is `Ok`; `Err` means no status was
/// received at all.
pub trait Transport {
    fn post(&mut self, job: &UploadJob) -> Result<u16, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn post(&mut self, job: &UploadJob) -> Result<u16, TransportError> {
        (**self).post(job)
    }
}

/// Blocking HTTP transport backed by a `ureq` agent.
///
/// Each job becomes one `multipart/form-data` POST whose single file part is
/// named after the job filename.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self { agent }
    }
}

impl Transport for HttpTransport {
    fn post(&mut self, job: &UploadJob) -> Result<u16, TransportError> {
        let body = MultipartBody::single_file(
            &job.filename,
            &job.filename,
            JPEG_CONTENT_TYPE,
            &job.bytes,
        );
        let result = self
            .agent
            .post(&job.url)
            .set("Content-Type", &body.content_type())
            .send_bytes(body.as_bytes());

        match result {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(code, _response)) => Ok(code),
            Err(ureq::Error::Transport(err)) => Err(TransportError::Connection(err.to_string())),
        }
    }
}
