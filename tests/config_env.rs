use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use motion_capture::config::{CaptureConfig, ConfigOverrides};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MOTION_CONFIG",
        "MOTION_URL",
        "MOTION_THRESHOLD",
        "MOTION_DEVICE",
        "MOTION_OUT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "threshold": 12.5,
            "camera": { "index": 1, "width": 640, "height": 480 },
            "actions": { "write": true },
            "upload": { "url": "http://uploads.local:9000/frames", "timeout_secs": 4 },
            "output": { "dir": "/var/lib/motion", "jpeg_quality": 80 }
        }"#,
    );

    std::env::set_var("MOTION_CONFIG", file.path());
    std::env::set_var("MOTION_THRESHOLD", "7");
    std::env::set_var("MOTION_OUT_DIR", "/tmp/motion");

    let cfg = CaptureConfig::load(&ConfigOverrides::default()).expect("load config");
    assert_eq!(cfg.threshold, 7.0);
    assert_eq!(cfg.camera.index, 1);
    assert_eq!((cfg.camera.width, cfg.camera.height), (640, 480));
    assert_eq!(cfg.camera.device_path(), "/dev/video1");
    assert!(cfg.actions.write);
    assert!(!cfg.actions.send);
    assert_eq!(cfg.upload.url, "http://uploads.local:9000/frames");
    assert_eq!(cfg.upload.timeout, Duration::from_secs(4));
    assert_eq!(cfg.output.dir, PathBuf::from("/tmp/motion"));
    assert_eq!(cfg.output.jpeg_quality, 80);

    clear_env();
}

#[test]
fn command_line_beats_env_and_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "threshold": 30, "camera": { "device": "/dev/video4" } }"#);
    std::env::set_var("MOTION_THRESHOLD", "20");
    std::env::set_var("MOTION_URL", "http://env.local/");

    let overrides = ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        threshold: Some(2.0),
        url: Some("https://cli.local/upload".to_string()),
        cam: Some(3),
        send: true,
        verbose: true,
        ..ConfigOverrides::default()
    };
    let cfg = CaptureConfig::load(&overrides).expect("load config");
    assert_eq!(cfg.threshold, 2.0);
    assert_eq!(cfg.upload.url, "https://cli.local/upload");
    assert_eq!(cfg.camera.device_path(), "/dev/video3");
    assert!(cfg.actions.send);
    assert!(cfg.verbose);

    clear_env();
}

#[test]
fn env_device_selects_synthetic_camera() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MOTION_DEVICE", "stub://porch");
    let cfg = CaptureConfig::load(&ConfigOverrides::default()).expect("load config");
    assert!(cfg.camera.is_synthetic());
    assert_eq!(cfg.camera.device_path(), "stub://porch");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MOTION_THRESHOLD", "lots");
    assert!(CaptureConfig::load(&ConfigOverrides::default()).is_err());
    clear_env();

    let negative = ConfigOverrides {
        threshold: Some(-1.0),
        ..ConfigOverrides::default()
    };
    assert!(CaptureConfig::load(&negative).is_err());

    let bad_url = ConfigOverrides {
        url: Some("not a url".to_string()),
        ..ConfigOverrides::default()
    };
    assert!(CaptureConfig::load(&bad_url).is_err());

    let file = write_config(r#"{ "camera": { "width": 0 } }"#);
    let zero_width = ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        ..ConfigOverrides::default()
    };
    assert!(CaptureConfig::load(&zero_width).is_err());

    let missing = ConfigOverrides {
        config_path: Some(PathBuf::from("/nonexistent/motion.json")),
        ..ConfigOverrides::default()
    };
    assert!(CaptureConfig::load(&missing).is_err());
}
