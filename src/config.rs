use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::validate_threshold;
use crate::dispatch::{Actions, DEFAULT_JPEG_QUALITY};
use crate::ingest::CameraSettings;

const DEFAULT_THRESHOLD: f64 = 10.0;
const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 960;
const DEFAULT_URL: &str = "http://0.0.0.0:8000/";
const DEFAULT_OUTPUT_DIR: &str = ".";
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    threshold: Option<f64>,
    verbose: Option<bool>,
    camera: Option<CameraConfigFile>,
    actions: Option<ActionsConfigFile>,
    upload: Option<UploadConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    index: Option<u32>,
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ActionsConfigFile {
    show: Option<bool>,
    write: Option<bool>,
    send: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct UploadConfigFile {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    jpeg_quality: Option<u8>,
}

/// Process-wide configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub camera: CameraSettings,
    pub threshold: f64,
    pub actions: Actions,
    pub upload: UploadSettings,
    pub output: OutputSettings,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub jpeg_quality: u8,
}

/// Values supplied on the command line. `None` / `false` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub cam: Option<u32>,
    pub device: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub url: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub jpeg_quality: Option<u8>,
    pub upload_timeout_secs: Option<u64>,
    pub show: bool,
    pub write: bool,
    pub send: bool,
    pub verbose: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_file(CaptureConfigFile::default())
    }
}

impl CaptureConfig {
    /// Layer defaults, the config file (`--config` or `MOTION_CONFIG`),
    /// `MOTION_*` environment variables, and command-line overrides, then validate.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var("MOTION_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => CaptureConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CaptureConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let actions_file = file.actions.unwrap_or_default();
        let upload_file = file.upload.unwrap_or_default();
        let output_file = file.output.unwrap_or_default();
        Self {
            camera: CameraSettings {
                index: camera_file.index.unwrap_or(DEFAULT_CAMERA_INDEX),
                device: camera_file.device,
                width: camera_file.width.unwrap_or(DEFAULT_WIDTH),
                height: camera_file.height.unwrap_or(DEFAULT_HEIGHT),
            },
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            actions: Actions {
                show: actions_file.show.unwrap_or(false),
                write: actions_file.write.unwrap_or(false),
                send: actions_file.send.unwrap_or(false),
            },
            upload: UploadSettings {
                url: upload_file.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
                timeout: Duration::from_secs(
                    upload_file
                        .timeout_secs
                        .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS),
                ),
            },
            output: OutputSettings {
                dir: output_file
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                jpeg_quality: output_file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            },
            verbose: file.verbose.unwrap_or(false),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("MOTION_URL") {
            if !url.trim().is_empty() {
                self.upload.url = url;
            }
        }
        if let Ok(device) = std::env::var("MOTION_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = Some(device);
            }
        }
        if let Ok(dir) = std::env::var("MOTION_OUT_DIR") {
            if !dir.trim().is_empty() {
                self.output.dir = PathBuf::from(dir);
            }
        }
        if let Ok(threshold) = std::env::var("MOTION_THRESHOLD") {
            self.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTION_THRESHOLD must be a number"))?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(threshold) = overrides.threshold {
            self.threshold = threshold;
        }
        if let Some(cam) = overrides.cam {
            // An explicit index beats a device path from a lower layer.
            self.camera.index = cam;
            self.camera.device = None;
        }
        if let Some(device) = &overrides.device {
            self.camera.device = Some(device.clone());
        }
        if let Some(width) = overrides.width {
            self.camera.width = width;
        }
        if let Some(height) = overrides.height {
            self.camera.height = height;
        }
        if let Some(url) = &overrides.url {
            self.upload.url = url.clone();
        }
        if let Some(dir) = &overrides.out_dir {
            self.output.dir = dir.clone();
        }
        if let Some(quality) = overrides.jpeg_quality {
            self.output.jpeg_quality = quality;
        }
        if let Some(secs) = overrides.upload_timeout_secs {
            self.upload.timeout = Duration::from_secs(secs);
        }
        self.actions.show |= overrides.show;
        self.actions.write |= overrides.write;
        self.actions.send |= overrides.send;
        self.verbose |= overrides.verbose;
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "frame size must be non-zero, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(anyhow!(
                "jpeg quality must be within 1..=100, got {}",
                self.output.jpeg_quality
            ));
        }
        if self.upload.timeout.is_zero() {
            return Err(anyhow!("upload timeout must be greater than zero"));
        }
        let url = url::Url::parse(&self.upload.url)
            .with_context(|| format!("invalid upload url '{}'", self.upload.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported upload scheme '{}'; expected http or https",
                url.scheme()
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CaptureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_table() {
        let cfg = CaptureConfig::default();
        assert_eq!(cfg.threshold, 10.0);
        assert_eq!(cfg.camera.index, 0);
        assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 960));
        assert_eq!(cfg.upload.url, "http://0.0.0.0:8000/");
        assert_eq!(cfg.actions, Actions::default());
        assert!(!cfg.verbose);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_win_and_flags_accumulate() {
        let mut cfg = CaptureConfig::default();
        cfg.actions.write = true;
        cfg.apply_overrides(&ConfigOverrides {
            threshold: Some(3.5),
            cam: Some(2),
            send: true,
            ..ConfigOverrides::default()
        });
        assert_eq!(cfg.threshold, 3.5);
        assert_eq!(cfg.camera.device_path(), "/dev/video2");
        assert!(cfg.actions.write);
        assert!(cfg.actions.send);
        assert!(!cfg.actions.show);
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = CaptureConfig::default();
        cfg.threshold = -0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.threshold = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.camera.width = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.upload.url = "ftp://example.com/".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.output.jpeg_quality = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let parsed: std::result::Result<CaptureConfigFile, _> =
            serde_json::from_str(r#"{ "thresh": 4 }"#);
        assert!(parsed.is_err());
    }
}
