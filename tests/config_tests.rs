// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use material_sorter::config::CameraSource;
use material_sorter::{AppError, Config};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(
        config.camera,
        CameraSource::V4l2 {
            device: "/dev/video0".to_string()
        }
    );
    assert_eq!((config.capture_width, config.capture_height), (640, 480));
    assert_eq!(config.led_pulse(), Duration::from_secs(1));
    assert_eq!(config.gpio_root, PathBuf::from("/sys/class/gpio"));
    assert!(config.model_path.is_none());
    assert!(config.validate().is_ok(), "Defaults should be valid");
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = Config::from_json(r#"{ "led_pulse_ms": 250, "warmup_frames": 0 }"#).unwrap();

    assert_eq!(config.led_pulse(), Duration::from_millis(250));
    assert_eq!(config.warmup_frames, 0);
    assert_eq!(config.capture_width, 640, "Unset fields keep their defaults");
    assert_eq!(config.button_debounce(), Duration::from_millis(30));
}

#[test]
fn test_still_camera_source() {
    let config =
        Config::from_json(r#"{ "camera": { "kind": "still", "path": "/srv/samples" } }"#).unwrap();

    assert_eq!(
        config.camera,
        CameraSource::Still {
            path: PathBuf::from("/srv/samples")
        }
    );
}

#[test]
fn test_board_overrides_from_json() {
    let config = Config::from_json(
        r#"{ "board": { "leds": [5, 6, 13], "disable_button": true, "gpio_base": 512 } }"#,
    )
    .unwrap();

    assert_eq!(config.board.leds, Some([5, 6, 13]));
    assert!(config.board.disable_button);
    assert_eq!(config.board.gpio_base, Some(512));
}

#[test]
fn test_invalid_values_rejected() {
    let zero_size = Config {
        capture_width: 0,
        ..Config::default()
    };
    assert!(matches!(zero_size.validate(), Err(AppError::Config(_))));

    let zero_poll = Config {
        button_poll_ms: 0,
        ..Config::default()
    };
    assert!(matches!(zero_poll.validate(), Err(AppError::Config(_))));

    let zero_timeout = Config {
        shutdown_timeout_ms: 0,
        ..Config::default()
    };
    assert!(matches!(zero_timeout.validate(), Err(AppError::Config(_))));
}

#[test]
fn test_malformed_json_is_config_error() {
    assert!(matches!(
        Config::from_json("{ not json"),
        Err(AppError::Config(_))
    ));
    assert!(matches!(
        Config::from_json(r#"{ "camera": { "kind": "webcam" } }"#),
        Err(AppError::Config(_))
    ));
}

#[test]
fn test_missing_file_is_config_error() {
    let result = Config::load(Some(Path::new("/nonexistent/material-sorter.json")));
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn test_explicit_model_path_wins() {
    let config = Config {
        model_path: Some(PathBuf::from("/opt/models/custom.json")),
        ..Config::default()
    };
    assert_eq!(
        config.resolve_model_path(),
        PathBuf::from("/opt/models/custom.json")
    );

    let bundled = Config::default().resolve_model_path();
    assert!(bundled.ends_with("model.json"));
}

#[test]
fn test_roundtrip_through_file() {
    let path = std::env::temp_dir().join(format!(
        "material-sorter-config-{}.json",
        std::process::id()
    ));
    let config = Config {
        led_pulse_ms: 500,
        camera: CameraSource::Still {
            path: PathBuf::from("samples"),
        },
        ..Config::default()
    };
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = Config::load(Some(&path)).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, config);
}
