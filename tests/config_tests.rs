// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use camera_service::backends::{BackendKind, CameraPosition};
use camera_service::{CaptureMode, ServiceConfig};

#[test]
fn test_config_default() {
    let config = ServiceConfig::default();

    // Check sensible defaults
    assert!(
        config.mirror_front_camera,
        "Front camera mirroring should be enabled by default"
    );
    assert!(config.prefer_hevc);
    assert_eq!(config.backend, BackendKind::GStreamer);
    assert_eq!(config.default_capture_mode, CaptureMode::Photo);
    assert_eq!(config.photo_dir(), std::env::temp_dir());
}

#[test]
fn test_config_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = ServiceConfig {
        backend: BackendKind::Virtual,
        preferred_position: Some(CameraPosition::Front),
        prefer_hevc: false,
        default_capture_mode: CaptureMode::Video,
        ..Default::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(ServiceConfig::load_from(&path).unwrap(), config);
}

#[test]
fn test_missing_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = ServiceConfig::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(loaded, ServiceConfig::default());
}

#[test]
fn test_malformed_config_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(ServiceConfig::load_from(&path).is_err());
    assert_eq!(ServiceConfig::load_or_default(&path), ServiceConfig::default());
}
