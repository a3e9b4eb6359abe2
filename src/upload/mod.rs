//! Upload queue and background uploader.
//!
//! The dispatcher pushes `UploadJob`s onto an unbounded FIFO queue; a single
//! uploader thread pops them and performs one blocking POST per job. Every
//! failure is logged and the job discarded: no retry, no dead-letter.
//!
//! Uploader states: `Idle` (waiting on the queue) and `Sending` (POST in
//! flight). Every attempt returns to `Idle`. The worker stops only when
//! shutdown is triggered or every queue sender has been dropped.

mod multipart;
mod transport;

use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::shutdown::Shutdown;

pub use multipart::MultipartBody;
pub use transport::{HttpTransport, Transport, JPEG_CONTENT_TYPE};

/// How long a queue pop waits before re-checking shutdown.
const POP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One image to transmit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadJob {
    pub url: String,
    pub bytes: Vec<u8>,
    pub filename: String,
}

// ----------------------------------------------------------------------------
// Queue
// ----------------------------------------------------------------------------

/// Create the upload queue. Pushes never block.
pub fn upload_queue() -> (UploadSender, UploadReceiver) {
    let (tx, rx) = mpsc::channel();
    (UploadSender { tx }, UploadReceiver { rx })
}

/// Producer side of the upload queue.
#[derive(Clone, Debug)]
pub struct UploadSender {
    tx: mpsc::Sender<UploadJob>,
}

impl UploadSender {
    /// Enqueue a job. Hands the job back if the uploader is gone.
    pub fn push(&self, job: UploadJob) -> Result<(), UploadJob> {
        self.tx.send(job).map_err(|err| err.0)
    }
}

/// Result of a queue pop.
#[derive(Debug, PartialEq, Eq)]
pub enum Pop {
    Job(UploadJob),
    Empty,
    Closed,
}

/// Consumer side of the upload queue.
#[derive(Debug)]
pub struct UploadReceiver {
    rx: mpsc::Receiver<UploadJob>,
}

impl UploadReceiver {
    pub fn try_pop(&self) -> Pop {
        match self.rx.try_recv() {
            Ok(job) => Pop::Job(job),
            Err(TryRecvError::Empty) => Pop::Empty,
            Err(TryRecvError::Disconnected) => Pop::Closed,
        }
    }

    pub fn pop_timeout(&self, timeout: Duration) -> Pop {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => Pop::Job(job),
            Err(RecvTimeoutError::Timeout) => Pop::Empty,
            Err(RecvTimeoutError::Disconnected) => Pop::Closed,
        }
    }
}

// ----------------------------------------------------------------------------
// Uploader
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploaderState {
    Idle,
    Sending,
}

/// How a single upload attempt resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 2xx response.
    Delivered(u16),
    /// Non-2xx response; the job was discarded.
    Rejected(u16),
    /// No response; the job was discarded.
    Unreachable(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub delivered: u64,
    pub rejected: u64,
    pub unreachable: u64,
}

impl UploadStats {
    pub fn attempts(&self) -> u64 {
        self.delivered + self.rejected + self.unreachable
    }
}

pub struct Uploader<T: Transport> {
    transport: T,
    state: UploaderState,
    stats: UploadStats,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: UploaderState::Idle,
            stats: UploadStats::default(),
        }
    }

    pub fn state(&self) -> UploaderState {
        self.state
    }

    pub fn stats(&self) -> UploadStats {
        self.stats
    }

    /// Attempt one job. Never fails: every outcome is logged and the job dropped.
    pub fn handle(&mut self, job: UploadJob) -> UploadOutcome {
        self.state = UploaderState::Sending;
        log::info!("posting {} to {}", job.filename, job.url);
        let outcome = match self.transport.post(&job) {
            Ok(status) if (200..300).contains(&status) => {
                self.stats.delivered += 1;
                log::debug!("posted {} ({})", job.filename, status);
                UploadOutcome::Delivered(status)
            }
            Ok(status) => {
                self.stats.rejected += 1;
                log::error!("non-ok HTTP code {} for {}", status, job.filename);
                UploadOutcome::Rejected(status)
            }
            Err(err) => {
                self.stats.unreachable += 1;
                log::info!("{}", err);
                UploadOutcome::Unreachable(err.to_string())
            }
        };
        self.state = UploaderState::Idle;
        outcome
    }

    /// Drain the queue until shutdown or until every sender is dropped.
    ///
    /// Jobs still queued at shutdown are not sent.
    pub fn run(&mut self, queue: &UploadReceiver, shutdown: &Shutdown) -> UploadStats {
        loop {
            if shutdown.is_triggered() {
                break;
            }
            match queue.pop_timeout(POP_POLL_INTERVAL) {
                Pop::Job(job) => {
                    self.handle(job);
                }
                Pop::Empty => continue,
                Pop::Closed => break,
            }
        }
        log::info!(
            "uploader stopped: delivered={} rejected={} unreachable={}",
            self.stats.delivered,
            self.stats.rejected,
            self.stats.unreachable
        );
        self.stats
    }
}

/// Handle to the uploader thread.
#[derive(Debug)]
pub struct UploaderHandle {
    shutdown: Shutdown,
    join: Option<JoinHandle<UploadStats>>,
}

impl UploaderHandle {
    /// Trigger shutdown and wait for the worker. Returns its final counters.
    pub fn stop(mut self) -> Result<UploadStats> {
        self.shutdown.trigger();
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("uploader thread panicked")),
            None => Ok(UploadStats::default()),
        }
    }

    /// Wait for the worker without triggering shutdown.
    ///
    /// Returns once every queue sender is dropped and the queued jobs have
    /// been attempted, or once shutdown is triggered elsewhere.
    pub fn join(mut self) -> Result<UploadStats> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("uploader thread panicked")),
            None => Ok(UploadStats::default()),
        }
    }
}

/// Run an uploader on its own thread. The transport lives only on that thread.
pub fn spawn_uploader<T>(
    transport: T,
    queue: UploadReceiver,
    shutdown: Shutdown,
) -> Result<UploaderHandle>
where
    T: Transport + Send + 'static,
{
    let worker_shutdown = shutdown.clone();
    let join = std::thread::Builder::new()
        .name("uploader".to_string())
        .spawn(move || Uploader::new(transport).run(&queue, &worker_shutdown))?;
    Ok(UploaderHandle {
        shutdown,
        join: Some(join),
    })
}
