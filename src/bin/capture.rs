//! capture - webcam motion capture
//!
//! This binary:
//! 1. Loads configuration (defaults, JSON file, MOTION_* env, flags)
//! 2. Opens the camera and the background model
//! 3. Runs the enabled show / write / send actions for each detection
//! 4. Uploads sent frames from a background thread until Ctrl-C

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use motion_capture::{
    dispatch::JpegFrameEncoder, spawn_uploader, upload_queue, CaptureConfig, ConfigOverrides,
    Detector, Dispatcher, HttpTransport, Shutdown,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture webcam frames that contain motion")]
struct Args {
    /// Minimum motion score (mean foreground mask value, 0..=255) to trigger an event.
    #[arg(long)]
    threshold: Option<f64>,

    /// Requested capture width.
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height.
    #[arg(long)]
    height: Option<u32>,

    /// Camera index, opened as /dev/video<cam>.
    #[arg(long)]
    cam: Option<u32>,

    /// Device path override; `stub://name` selects the synthetic camera.
    #[arg(long)]
    device: Option<String>,

    /// Show detected frames in a window.
    #[arg(long)]
    show: bool,

    /// Write detected frames to the output directory.
    #[arg(long)]
    write: bool,

    /// Upload detected frames to --url.
    #[arg(long)]
    send: bool,

    /// Upload destination.
    #[arg(long)]
    url: Option<String>,

    /// Directory for written frames.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// JPEG quality (1-100).
    #[arg(long)]
    quality: Option<u8>,

    /// Timeout for each upload request, in seconds.
    #[arg(long)]
    upload_timeout_secs: Option<u64>,

    /// JSON config file.
    #[arg(long, env = "MOTION_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            threshold: self.threshold,
            cam: self.cam,
            device: self.device.clone(),
            width: self.width,
            height: self.height,
            url: self.url.clone(),
            out_dir: self.out_dir.clone(),
            jpeg_quality: self.quality,
            upload_timeout_secs: self.upload_timeout_secs,
            show: self.show,
            write: self.write,
            send: self.send,
            verbose: self.verbose,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = CaptureConfig::load(&args.overrides())?;

    let level = if cfg.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            log::info!("interrupt received, shutting down");
            shutdown.trigger();
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let detector = Detector::open(&cfg)?;
    log::info!(
        "capturing from {} at {}x{}, threshold {}",
        detector.camera().device_path(),
        cfg.camera.width,
        cfg.camera.height,
        cfg.threshold
    );
    if !cfg.actions.any() {
        log::warn!("no actions enabled; detections will only be logged");
    }

    if cfg.actions.write {
        std::fs::create_dir_all(&cfg.output.dir).with_context(|| {
            format!("failed to create output dir {}", cfg.output.dir.display())
        })?;
    }

    let encoder = JpegFrameEncoder::new(cfg.output.jpeg_quality)?;
    let mut dispatcher = Dispatcher::new(cfg.actions, &cfg.output.dir, cfg.upload.url.clone())
        .with_encoder(Box::new(encoder));

    let uploader = if cfg.actions.send {
        let (tx, rx) = upload_queue();
        let transport = HttpTransport::new(cfg.upload.timeout);
        let handle = spawn_uploader(transport, rx, shutdown.clone())?;
        log::info!("uploading detections to {}", cfg.upload.url);
        dispatcher = dispatcher.with_uploads(tx);
        Some(handle)
    } else {
        None
    };

    if cfg.actions.show {
        dispatcher = attach_preview(dispatcher);
    }

    let mut detections = detector.produce(shutdown.clone());
    for detection in detections.by_ref() {
        let report = dispatcher.dispatch(detection);
        log::debug!(
            "{}: show={:?} write={:?} send={:?}",
            report.capture_id,
            report.show,
            report.write,
            report.send
        );
    }

    let stats = detections.stats();
    log::info!(
        "capture stopped: frames={}, read_failures={}, model_failures={}, detections={}",
        stats.frames_read,
        stats.read_failures,
        stats.model_failures,
        stats.detections
    );

    // Closes the queue before the uploader is joined.
    drop(dispatcher);
    if let Some(handle) = uploader {
        let uploads = handle.stop()?;
        log::debug!("{} upload attempts", uploads.attempts());
    }
    Ok(())
}

#[cfg(feature = "preview")]
fn attach_preview(dispatcher: Dispatcher) -> Dispatcher {
    use motion_capture::dispatch::WindowPreview;
    dispatcher.with_preview(Box::new(WindowPreview::new("motion")))
}

#[cfg(not(feature = "preview"))]
fn attach_preview(dispatcher: Dispatcher) -> Dispatcher {
    log::warn!("--show requested but this build has no preview window (enable the `preview` feature)");
    dispatcher
}
