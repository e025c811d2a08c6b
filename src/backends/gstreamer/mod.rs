// SPDX-License-Identifier: MPL-2.0

//! GStreamer capture backend
//!
//! Devices are discovered through a `GstDeviceMonitor` filtered to
//! `Video/Source`. Sessions build a preview pipeline ending in an `appsink`
//! (see [`session`]); stills are encoded from that stream and recordings are
//! fed from it, so the camera is opened exactly once.

mod session;

pub use session::GStreamerSession;

use super::{CaptureBackend, CaptureSession};
use super::types::*;
use crate::constants::BitratePreset;
use crate::errors::{BackendError, BackendResult};
use crate::flash::FlashDevice;
use gstreamer::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// GStreamer backend implementation
pub struct GStreamerBackend {
    /// Flash LEDs found at startup; shared by every session
    flash_leds: Arc<Vec<FlashDevice>>,
    bitrate: BitratePreset,
}

impl GStreamerBackend {
    pub fn new(bitrate: BitratePreset) -> Self {
        Self {
            flash_leds: Arc::new(FlashDevice::discover()),
            bitrate,
        }
    }

    fn init() -> BackendResult<()> {
        gstreamer::init().map_err(|e| BackendError::NotAvailable(e.to_string()))
    }
}

impl Default for GStreamerBackend {
    fn default() -> Self {
        Self::new(BitratePreset::default())
    }
}

impl CaptureBackend for GStreamerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GStreamer
    }

    fn discover_devices(&self) -> Vec<CameraDevice> {
        if let Err(e) = Self::init() {
            warn!(error = %e, "GStreamer unavailable, no cameras");
            return Vec::new();
        }

        let monitor = gstreamer::DeviceMonitor::new();
        let _ = monitor.add_filter(Some("Video/Source"), None);
        if let Err(e) = monitor.start() {
            warn!(error = %e, "Failed to start device monitor");
            return Vec::new();
        }

        let has_leds = !self.flash_leds.is_empty();
        let devices: Vec<CameraDevice> = monitor
            .devices()
            .iter()
            .enumerate()
            .filter_map(|(index, device)| describe_device(index, device, has_leds))
            .collect();

        monitor.stop();

        info!(count = devices.len(), "GStreamer cameras enumerated");
        devices
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        // Desktop Linux has no per-application camera grant outside the portal;
        // device node permissions surface as pipeline errors instead.
        AuthorizationStatus::Authorized
    }

    fn request_access(&self) -> bool {
        true
    }

    fn create_session(&self, events: EventSink) -> BackendResult<Box<dyn CaptureSession>> {
        Self::init()?;
        Ok(Box::new(GStreamerSession::new(
            events,
            Arc::clone(&self.flash_leds),
            self.bitrate,
        )))
    }
}

/// Build a [`CameraDevice`] from monitor properties
///
/// Returns `None` for devices without a usable source locator.
fn describe_device(
    index: usize,
    device: &gstreamer::Device,
    has_leds: bool,
) -> Option<CameraDevice> {
    let name = device.display_name().to_string();
    let props = device.properties();

    let get = |key: &str| -> Option<String> {
        props
            .as_ref()
            .and_then(|p| p.get::<String>(key).ok())
            .filter(|v| !v.is_empty())
    };

    let path = if let Some(serial) = get("object.serial") {
        format!("pipewire:{}", serial)
    } else if let Some(node) = get("api.v4l2.path").or_else(|| get("device.path")) {
        node
    } else {
        debug!(name = %name, "Skipping device without source locator");
        return None;
    };

    let position = get("api.libcamera.location")
        .or_else(|| get("camera.location"))
        .map(|loc| CameraPosition::from_location(&loc))
        .unwrap_or_else(|| {
            let bus = get("api.v4l2.cap.bus_info").unwrap_or_default();
            if bus.starts_with("usb-") {
                CameraPosition::External
            } else {
                CameraPosition::Unspecified
            }
        });

    let device_type = match position {
        CameraPosition::External => DeviceType::External,
        _ => DeviceType::WideAngle,
    };

    // Phone flash LEDs sit next to the rear sensor
    let has_light = has_leds && position == CameraPosition::Back;

    let id = get("device.serial")
        .or_else(|| get("object.path"))
        .unwrap_or_else(|| format!("{}#{}", path, index));

    debug!(name = %name, path = %path, %position, "Found camera");

    Some(CameraDevice {
        id,
        name,
        path,
        position,
        device_type,
        connected: true,
        suspended: false,
        has_flash: has_light,
        has_torch: has_light,
    })
}

/// GStreamer source element description for a device locator
pub(crate) fn source_description(path: &str) -> String {
    if let Some(serial) = path.strip_prefix("pipewire:") {
        format!("pipewiresrc target-object={} do-timestamp=true", serial)
    } else if path.starts_with("/dev/") {
        format!("v4l2src device={}", path)
    } else {
        "autovideosrc".to_string()
    }
}
