// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the camera service over the virtual backend

use camera_service::backends::virtual_camera::{VirtualBackend, VirtualBehavior, VirtualProbe};
use camera_service::backends::{
    AuthorizationStatus, BackendKind, CameraPosition, OutputKind, PhotoCodec,
};
use camera_service::{
    CameraService, CameraServiceError, CaptureMode, FlashMode, RecordingEvent, ServiceConfig,
    SessionPhase,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    service: Arc<CameraService>,
    probe: VirtualProbe,
    photos: TempDir,
    videos: TempDir,
}

fn harness(behavior: VirtualBehavior) -> Harness {
    let photos = tempfile::tempdir().unwrap();
    let videos = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        backend: BackendKind::Virtual,
        photo_directory: Some(photos.path().to_path_buf()),
        video_directory: Some(videos.path().to_path_buf()),
        ..Default::default()
    };
    let backend = VirtualBackend::new(behavior);
    let probe = backend.probe();
    let service = CameraService::new(Arc::new(backend), config).unwrap();
    Harness {
        service: Arc::new(service),
        probe,
        photos,
        videos,
    }
}

async fn ready(behavior: VirtualBehavior) -> Harness {
    let h = harness(behavior);
    h.service.setup().await.unwrap();
    h
}

async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..300 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn files_in(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

// ===== Mode and flash =====

#[tokio::test]
async fn test_flash_cycles_off_on_auto() {
    let h = harness(VirtualBehavior::default());
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(h.service.toggle_flash().await);
    }
    assert_eq!(
        seen,
        [FlashMode::On, FlashMode::Auto, FlashMode::Off, FlashMode::On]
    );
    assert_eq!(h.service.flash_mode(), FlashMode::On);
}

#[tokio::test]
async fn test_mode_switch_keeps_other_flash_value() {
    let h = harness(VirtualBehavior::default());

    h.service.toggle_flash().await;
    assert_eq!(h.service.flash_mode(), FlashMode::On);

    h.service.set_capture_mode(CaptureMode::Video).await;
    assert_eq!(h.service.flash_mode(), FlashMode::Off);
    h.service.toggle_flash().await;
    h.service.toggle_flash().await;

    h.service.set_capture_mode(CaptureMode::Photo).await;
    assert_eq!(h.service.flash_mode(), FlashMode::On);

    let snapshot = h.service.snapshot();
    assert_eq!(snapshot.flash.photo, FlashMode::On);
    assert_eq!(snapshot.flash.video, FlashMode::Auto);
}

#[tokio::test]
async fn test_video_torch_applied_before_toggle_returns() {
    let h = ready(VirtualBehavior::default()).await;

    h.service.set_capture_mode(CaptureMode::Video).await;
    assert_eq!(h.service.toggle_flash().await, FlashMode::On);
    assert_eq!(h.probe.torch(), FlashMode::On);

    assert_eq!(h.service.toggle_flash().await, FlashMode::Auto);
    assert_eq!(h.probe.torch(), FlashMode::Auto);

    // Photo mode forces the torch off, video mode restores it
    h.service.set_capture_mode(CaptureMode::Photo).await;
    assert_eq!(h.probe.torch(), FlashMode::Off);
    h.service.set_capture_mode(CaptureMode::Video).await;
    assert_eq!(h.probe.torch(), FlashMode::Auto);
}

#[tokio::test]
async fn test_photo_flash_toggle_engages_no_light() {
    let h = ready(VirtualBehavior::default()).await;

    h.service.toggle_flash().await;
    h.service.toggle_flash().await;
    assert_eq!(h.probe.torch(), FlashMode::Off);
    assert_eq!(h.probe.flash_fired(), 0);
}

#[tokio::test]
async fn test_photo_request_carries_flash_value() {
    let h = ready(VirtualBehavior::default()).await;

    h.service.toggle_flash().await;
    h.service.take_photo().await.unwrap();

    let request = *h.probe.photo_requests().last().unwrap();
    assert_eq!(request.flash, FlashMode::On);
    assert_eq!(h.probe.flash_fired(), 1);
}

#[tokio::test]
async fn test_auto_flash_fires_in_low_light() {
    let h = ready(VirtualBehavior {
        low_light: true,
        ..Default::default()
    })
    .await;

    h.service.toggle_flash().await;
    h.service.toggle_flash().await;
    assert_eq!(h.service.flash_mode(), FlashMode::Auto);
    h.service.take_photo().await.unwrap();
    assert_eq!(h.probe.flash_fired(), 1);
}

#[tokio::test]
async fn test_front_camera_photos_have_no_flash() {
    let h = ready(VirtualBehavior::default()).await;
    h.service.toggle_flash().await;
    h.service.switch_camera().await.unwrap();

    h.service.take_photo().await.unwrap();
    assert_eq!(h.probe.photo_requests().last().unwrap().flash, FlashMode::Off);
    assert_eq!(h.probe.flash_fired(), 0);
}

// ===== Session lifecycle =====

#[tokio::test]
async fn test_setup_prefers_back_wide_camera() {
    let h = ready(VirtualBehavior::default()).await;

    let snapshot = h.service.snapshot();
    assert!(snapshot.configured);
    assert_eq!(snapshot.phase, SessionPhase::Running);
    assert_eq!(snapshot.devices.len(), 2);
    assert_eq!(
        snapshot.current_device.unwrap().position,
        CameraPosition::Back
    );
    assert_eq!(h.probe.outputs(), OutputKind::ALL.to_vec());
    assert!(h.probe.is_running());
    assert!(!h.probe.is_mirrored());
}

#[tokio::test]
async fn test_stop_on_unconfigured_session_is_noop() {
    let h = harness(VirtualBehavior::default());

    h.service.stop_session().await;

    let snapshot = h.service.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Uninitialized);
    assert!(!snapshot.configured);
    assert_eq!(h.probe.commits(), 0);
}

#[tokio::test]
async fn test_stop_and_restart() {
    let h = ready(VirtualBehavior::default()).await;

    h.service.stop_session().await;
    assert!(!h.probe.is_running());
    assert_eq!(h.service.snapshot().phase, SessionPhase::Stopped);
    assert!(h.service.is_configured());
    assert_eq!(
        h.service.take_photo().await,
        Err(CameraServiceError::ConfigurationFailed)
    );

    h.service.start_session().await.unwrap();
    assert!(h.probe.is_running());
    assert!(h.service.take_photo().await.is_ok());
}

#[tokio::test]
async fn test_cleanup_requires_reconfigure() {
    let h = ready(VirtualBehavior::default()).await;
    let commits_before = h.probe.commits();

    h.service.cleanup_camera().await;

    assert!(!h.service.is_configured());
    assert!(h.probe.outputs().is_empty());
    assert!(h.probe.input_id().is_none());
    assert!(!h.probe.is_running());
    assert_eq!(h.service.snapshot().devices.len(), 2);
    assert_eq!(
        h.service.take_photo().await,
        Err(CameraServiceError::ConfigurationFailed)
    );
    assert!(h.service.capture_photo().await.is_none());

    h.service.start_session().await.unwrap();
    assert!(h.probe.commits() > commits_before);
    assert_eq!(h.probe.outputs(), OutputKind::ALL.to_vec());
    assert!(h.service.take_photo().await.is_ok());
}

#[tokio::test]
async fn test_configuration_failure_adds_nothing() {
    let h = harness(VirtualBehavior {
        rejected_outputs: vec![OutputKind::MovieFile],
        ..Default::default()
    });

    assert_eq!(
        h.service.setup().await,
        Err(CameraServiceError::ConfigurationFailed)
    );
    assert!(h.probe.outputs().is_empty());
    assert!(h.probe.input_id().is_none());
    assert!(!h.service.is_configured());
}

#[tokio::test]
async fn test_rejected_input_fails_configuration() {
    let h = harness(VirtualBehavior {
        rejected_inputs: vec!["virtual-back".to_string()],
        ..Default::default()
    });

    assert_eq!(
        h.service.setup().await,
        Err(CameraServiceError::ConfigurationFailed)
    );
    assert!(h.probe.outputs().is_empty());
    assert!(h.probe.input_id().is_none());
}

#[tokio::test]
async fn test_device_switch_preserves_outputs() {
    let h = ready(VirtualBehavior::default()).await;
    let outputs_before = h.service.outputs().await;

    h.service.switch_camera().await.unwrap();

    assert_eq!(h.service.outputs().await, outputs_before);
    assert_eq!(h.probe.outputs(), outputs_before);
    assert_eq!(h.probe.input_id().as_deref(), Some("virtual-front"));
    assert!(h.probe.is_mirrored());
    assert!(h.probe.is_running());
    assert_eq!(h.service.snapshot().phase, SessionPhase::Running);
}

#[tokio::test]
async fn test_device_switch_reapplies_video_torch() {
    let h = ready(VirtualBehavior::default()).await;
    h.service.set_capture_mode(CaptureMode::Video).await;
    h.service.toggle_flash().await;

    // Front camera has no torch
    h.service.switch_camera().await.unwrap();
    assert_eq!(h.probe.torch(), FlashMode::Off);

    h.service.switch_camera().await.unwrap();
    assert_eq!(h.probe.torch(), FlashMode::On);
}

#[tokio::test]
async fn test_switch_refused_while_recording() {
    let h = ready(VirtualBehavior::default()).await;
    let before = h.probe.input_id();
    h.service.start_recording().await.unwrap();

    assert_eq!(
        h.service.switch_camera().await,
        Err(CameraServiceError::RecordingFailed)
    );
    assert_eq!(h.probe.input_id(), before);
    assert!(h.probe.is_recording());
    assert!(h.service.finish_recording().await.is_ok());
}

#[tokio::test]
async fn test_switch_requires_configured_session() {
    let h = harness(VirtualBehavior::default());
    assert_eq!(
        h.service.switch_camera().await,
        Err(CameraServiceError::ConfigurationFailed)
    );
}

#[tokio::test]
async fn test_media_services_reset_restarts_session() {
    let h = ready(VirtualBehavior::default()).await;

    h.probe.simulate_media_services_reset();
    assert!(!h.probe.is_running());

    let probe = h.probe.clone();
    assert!(wait_until(move || probe.is_running()).await);
    assert_eq!(h.service.snapshot().phase, SessionPhase::Running);
    assert!(h.service.take_photo().await.is_ok());
}

#[tokio::test]
async fn test_reset_while_stopped_does_not_start() {
    let h = ready(VirtualBehavior::default()).await;
    h.service.stop_session().await;

    h.probe.simulate_media_services_reset();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!h.probe.is_running());
}

// ===== Authorization and devices =====

#[tokio::test]
async fn test_denied_access() {
    let h = harness(VirtualBehavior {
        authorization: AuthorizationStatus::NotDetermined,
        grant_on_request: false,
        ..Default::default()
    });

    assert!(!h.service.check_authorization().await);
    assert_eq!(
        h.service.setup().await,
        Err(CameraServiceError::PermissionDenied)
    );
    assert_eq!(
        h.service.take_photo().await,
        Err(CameraServiceError::PermissionDenied)
    );
}

#[tokio::test]
async fn test_access_granted_on_request() {
    let h = harness(VirtualBehavior {
        authorization: AuthorizationStatus::NotDetermined,
        ..Default::default()
    });
    h.service.setup().await.unwrap();
    assert_eq!(
        h.service.snapshot().authorization,
        AuthorizationStatus::Authorized
    );
}

#[tokio::test]
async fn test_no_cameras() {
    let h = harness(VirtualBehavior {
        devices: Vec::new(),
        ..Default::default()
    });

    assert!(h.service.refresh_devices().await.is_empty());
    assert_eq!(
        h.service.setup().await,
        Err(CameraServiceError::DeviceNotAvailable)
    );
    assert_eq!(
        h.service.take_photo().await,
        Err(CameraServiceError::DeviceNotAvailable)
    );
}

#[tokio::test]
async fn test_unusable_devices_are_hidden() {
    let mut behavior = VirtualBehavior::default();
    behavior.devices[1].suspended = true;
    let h = harness(behavior);

    let devices = h.service.refresh_devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].position, CameraPosition::Front);
}

// ===== Photos =====

#[tokio::test]
async fn test_take_photo_writes_jpeg() {
    let h = ready(VirtualBehavior::default()).await;

    let path = h.service.take_photo().await.unwrap();
    assert_eq!(path.parent().unwrap(), h.photos.path());
    assert_eq!(path.extension().unwrap(), "jpg");
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_hevc_preferred_when_supported() {
    let h = ready(VirtualBehavior {
        photo_codecs: vec![PhotoCodec::Jpeg, PhotoCodec::Hevc],
        ..Default::default()
    })
    .await;

    let path = h.service.take_photo().await.unwrap();
    assert_eq!(path.extension().unwrap(), "heic");
    assert_eq!(
        h.probe.photo_requests().last().unwrap().codec,
        PhotoCodec::Hevc
    );
}

#[tokio::test]
async fn test_capture_failure_is_reported() {
    let h = ready(VirtualBehavior {
        fail_photo_capture: true,
        ..Default::default()
    })
    .await;

    assert_eq!(
        h.service.take_photo().await,
        Err(CameraServiceError::CaptureFailed)
    );
    assert!(h.service.capture_photo().await.is_none());
    assert_eq!(files_in(&h.photos), 0);
}

#[tokio::test]
async fn test_overlapping_photos_each_get_a_result() {
    let h = ready(VirtualBehavior {
        hold_photos: true,
        ..Default::default()
    })
    .await;

    let first = tokio::spawn({
        let service = Arc::clone(&h.service);
        async move { service.take_photo().await }
    });
    let probe = h.probe.clone();
    assert!(wait_until(move || probe.held_count() == 1).await);

    let second = tokio::spawn({
        let service = Arc::clone(&h.service);
        async move { service.take_photo().await }
    });
    let probe = h.probe.clone();
    assert!(wait_until(move || probe.held_count() == 2).await);

    // Only the first request fails; results arrive newest first
    assert!(h.probe.fail_held(0));
    assert_eq!(h.probe.release_held_reversed(), 2);

    assert_eq!(
        first.await.unwrap(),
        Err(CameraServiceError::CaptureFailed)
    );
    let second = second.await.unwrap().unwrap();
    assert!(second.exists());
    assert_eq!(files_in(&h.photos), 1);
}

#[tokio::test]
async fn test_cleanup_cancels_pending_photos() {
    let h = ready(VirtualBehavior {
        hold_photos: true,
        ..Default::default()
    })
    .await;

    let pending = tokio::spawn({
        let service = Arc::clone(&h.service);
        async move { service.take_photo().await }
    });
    let probe = h.probe.clone();
    assert!(wait_until(move || probe.held_count() == 1).await);

    h.service.cleanup_camera().await;
    assert_eq!(
        pending.await.unwrap(),
        Err(CameraServiceError::UserCancelled)
    );
}

#[tokio::test]
async fn test_capture_with_completion() {
    let h = ready(VirtualBehavior::default()).await;
    let (tx, rx) = tokio::sync::oneshot::channel();

    h.service.capture_photo_with_completion(move |result| {
        let _ = tx.send(result);
    });

    let path = rx.await.unwrap().unwrap();
    assert!(path.exists());
}

// ===== Recording =====

#[tokio::test]
async fn test_record_and_finish() {
    let h = ready(VirtualBehavior::default()).await;
    let mut events = std::pin::pin!(h.service.recording_events());

    let started_path = h.service.start_recording().await.unwrap();
    assert_eq!(started_path.parent().unwrap(), h.videos.path());
    assert_eq!(
        events.next().await,
        Some(RecordingEvent::Started(started_path.clone()))
    );
    assert!(h.service.snapshot().is_recording);

    let finished = h.service.finish_recording().await.unwrap();
    assert_eq!(finished, started_path);
    assert!(std::fs::metadata(&finished).unwrap().len() > 0);
    assert!(!h.service.snapshot().is_recording);
    assert!(!h.probe.is_recording());
}

#[tokio::test]
async fn test_second_recording_is_rejected() {
    let h = ready(VirtualBehavior::default()).await;

    h.service.start_recording().await.unwrap();
    assert_eq!(
        h.service.start_recording().await,
        Err(CameraServiceError::RecordingFailed)
    );
    h.service.finish_recording().await.unwrap();
}

#[tokio::test]
async fn test_finish_without_recording_fails() {
    let h = ready(VirtualBehavior::default()).await;
    assert_eq!(
        h.service.finish_recording().await,
        Err(CameraServiceError::RecordingFailed)
    );
}

#[tokio::test]
async fn test_fire_and_forget_recording() {
    let h = ready(VirtualBehavior::default()).await;
    let mut events = std::pin::pin!(h.service.recording_events());

    h.service.start_video_recording();
    let Some(RecordingEvent::Started(path)) = events.next().await else {
        panic!("expected recording start");
    };

    h.service.stop_video_recording();
    assert_eq!(
        events.next().await,
        Some(RecordingEvent::Finished {
            path,
            result: Ok(())
        })
    );
    assert_eq!(files_in(&h.videos), 1);
}

#[tokio::test]
async fn test_recording_requires_running_session() {
    let h = harness(VirtualBehavior::default());
    h.service.refresh_devices().await;
    assert_eq!(
        h.service.start_recording().await,
        Err(CameraServiceError::DeviceNotAvailable)
    );

    let h = ready(VirtualBehavior::default()).await;
    h.service.stop_session().await;
    assert_eq!(
        h.service.start_recording().await,
        Err(CameraServiceError::ConfigurationFailed)
    );
}

// ===== Streams =====

#[tokio::test]
async fn test_preview_has_single_consumer() {
    let h = ready(VirtualBehavior::default()).await;

    let frames = h.service.preview_frames().expect("first consumer");
    assert!(h.service.preview_frames().is_none());

    let mut frames = Box::pin(frames);
    let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!((frame.width, frame.height), (64, 48));

    drop(frames);
    assert!(h.service.preview_frames().is_some());
}

#[tokio::test]
async fn test_snapshot_notifies_subscribers() {
    let h = harness(VirtualBehavior::default());
    let mut rx = h.service.subscribe();

    h.service.set_capture_mode(CaptureMode::Video).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().capture_mode, CaptureMode::Video);
}
