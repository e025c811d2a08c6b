// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking photos
//! - Recording videos
//!
//! Each command drives a [`CameraService`] on a private tokio runtime.

use camera_service::backends::{BackendKind, CameraDevice, backend_for_kind};
use camera_service::{CameraService, CaptureMode, FlashMode, ServiceConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_config(use_virtual: bool) -> ServiceConfig {
    let mut config = ServiceConfig::load();
    if use_virtual {
        config.backend = BackendKind::Virtual;
    }
    config
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// Set up the service and select camera `index` from the ordered device list
async fn open_camera(
    config: ServiceConfig,
    index: usize,
) -> Result<(CameraService, CameraDevice), Box<dyn std::error::Error>> {
    let backend = backend_for_kind(config.backend, config.bitrate_preset);
    let service = CameraService::new(backend, config)?;

    let devices = service.refresh_devices().await;
    if devices.is_empty() {
        return Err("No cameras found".into());
    }
    let device = devices.get(index).cloned().ok_or_else(|| {
        format!(
            "Camera index {} out of range (0-{})",
            index,
            devices.len() - 1
        )
    })?;

    service.setup().await?;
    if service.current_device().as_ref() != Some(&device) {
        service.switch_device(device.clone()).await?;
    }
    println!("Using camera: {}", device.name);
    Ok((service, device))
}

/// Move a finished capture to the path the user asked for
fn deliver(captured: &Path, output: Option<PathBuf>) -> std::io::Result<PathBuf> {
    let Some(output) = output else {
        return Ok(captured.to_path_buf());
    };
    let target = if output.is_dir() {
        output.join(captured.file_name().unwrap_or_default())
    } else {
        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        output
    };
    if std::fs::rename(captured, &target).is_err() {
        // Different filesystem
        std::fs::copy(captured, &target)?;
        std::fs::remove_file(captured)?;
    }
    Ok(target)
}

/// List all available cameras
pub fn list_cameras(use_virtual: bool) -> CliResult {
    let config = load_config(use_virtual);
    runtime()?.block_on(async move {
        let backend = backend_for_kind(config.backend, config.bitrate_preset);
        let service = CameraService::new(backend, config)?;
        let cameras = service.refresh_devices().await;

        if cameras.is_empty() {
            println!("No cameras found.");
            return Ok(());
        }

        println!("Available cameras:");
        println!();
        for (index, camera) in cameras.iter().enumerate() {
            println!("  [{}] {}", index, camera.name);
            println!("      Position: {}", camera.position);
            println!("      Source:   {}", camera.path);
            if camera.has_flash || camera.has_torch {
                println!("      Flash:    yes");
            }
            println!();
        }
        Ok(())
    })
}

/// Take a photo using the specified camera
pub fn take_photo(
    camera_index: usize,
    flash: FlashMode,
    output: Option<PathBuf>,
    use_virtual: bool,
) -> CliResult {
    let config = load_config(use_virtual);
    runtime()?.block_on(async move {
        let (service, _) = open_camera(config, camera_index).await?;

        service.set_capture_mode(CaptureMode::Photo).await;
        while service.flash_mode() != flash {
            service.toggle_flash().await;
        }
        if flash != FlashMode::Off {
            println!("Flash: {}", flash);
        }

        let captured = service.take_photo().await?;
        service.cleanup_camera().await;

        let path = deliver(&captured, output)?;
        println!("Photo saved: {}", path.display());
        Ok(())
    })
}

/// Record a video using the specified camera
pub fn record_video(
    camera_index: usize,
    duration: u64,
    torch: bool,
    output: Option<PathBuf>,
    use_virtual: bool,
) -> CliResult {
    let config = load_config(use_virtual);

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    runtime()?.block_on(async move {
        let (service, _) = open_camera(config, camera_index).await?;

        service.set_capture_mode(CaptureMode::Video).await;
        if torch {
            while service.flash_mode() != FlashMode::On {
                service.toggle_flash().await;
            }
        }

        let pending = service.start_recording().await?;
        println!("Output: {}", pending.display());
        println!("Duration: {} seconds", duration);
        println!();
        println!("Recording... (press Ctrl+C to stop early)");

        // Wait for duration or Ctrl+C
        let start = Instant::now();
        let target_duration = Duration::from_secs(duration);

        while start.elapsed() < target_duration {
            if stop_flag.load(Ordering::SeqCst) {
                println!();
                println!("Stopping early...");
                break;
            }

            // Print progress
            let elapsed = start.elapsed().as_secs();
            print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
            std::io::Write::flush(&mut std::io::stdout())?;

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        println!();

        let recorded = service.finish_recording().await?;
        service.cleanup_camera().await;

        let path = deliver(&recorded, output)?;
        println!("Video saved: {}", path.display());
        Ok(())
    })
}
