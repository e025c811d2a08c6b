// SPDX-License-Identifier: GPL-3.0-only

//! Simulated capture backend
//!
//! Behaves like a phone with a rear camera (flash and torch) and a front
//! camera, without touching any hardware:
//!
//! ```text
//! ┌──────────────────┐   frames every 33ms    ┌──────────────┐
//! │ Frame thread     │ ─────────────────────▶ │  EventSink   │
//! │ (test pattern)   │                        └──────────────┘
//! └──────────────────┘                               ▲
//! ┌──────────────────┐   photo / recording results   │
//! │ VirtualSession   │ ──────────────────────────────┘
//! └────────┬─────────┘
//!          │ publishes committed state
//!          ▼
//! ┌──────────────────┐
//! │ VirtualProbe     │  ← inspected by tests, drives fault injection
//! └──────────────────┘
//! ```
//!
//! [`VirtualBehavior`] selects which devices exist and which operations
//! fail, so every branch of the service can be exercised deterministically.

mod session;

pub use session::VirtualSession;

use super::types::*;
use super::{CaptureBackend, CaptureSession};
use crate::errors::{BackendError, BackendResult};
use crate::flash::FlashMode;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// What the simulated platform reports and how it misbehaves
#[derive(Debug, Clone)]
pub struct VirtualBehavior {
    /// Devices returned by discovery, in platform order
    pub devices: Vec<CameraDevice>,
    /// Initial authorization state
    pub authorization: AuthorizationStatus,
    /// Whether [`CaptureBackend::request_access`] grants access
    pub grant_on_request: bool,
    /// Outputs the session refuses to accept
    pub rejected_outputs: Vec<OutputKind>,
    /// Device ids the session refuses as input
    pub rejected_inputs: Vec<String>,
    /// Device ids that attach but cannot stream
    pub unstartable_inputs: Vec<String>,
    pub photo_codecs: Vec<PhotoCodec>,
    /// Report every photo request as failed
    pub fail_photo_capture: bool,
    /// Keep photo results until [`VirtualProbe::release_held_reversed`]
    pub hold_photos: bool,
    /// Render dark frames (drives auto flash)
    pub low_light: bool,
    pub frame_size: (u32, u32),
}

impl Default for VirtualBehavior {
    fn default() -> Self {
        Self {
            devices: vec![
                virtual_device("virtual-front", "Virtual Front Camera", CameraPosition::Front),
                virtual_device("virtual-back", "Virtual Back Camera", CameraPosition::Back),
            ],
            authorization: AuthorizationStatus::Authorized,
            grant_on_request: true,
            rejected_outputs: Vec::new(),
            rejected_inputs: Vec::new(),
            unstartable_inputs: Vec::new(),
            photo_codecs: vec![PhotoCodec::Jpeg],
            fail_photo_capture: false,
            hold_photos: false,
            low_light: false,
            frame_size: (64, 48),
        }
    }
}

/// A connected wide-angle device; back cameras carry flash and torch
pub fn virtual_device(id: &str, name: &str, position: CameraPosition) -> CameraDevice {
    let has_light = position == CameraPosition::Back;
    CameraDevice {
        id: id.to_string(),
        name: name.to_string(),
        path: format!("virtual:{}", id),
        position,
        device_type: DeviceType::WideAngle,
        connected: true,
        suspended: false,
        has_flash: has_light,
        has_torch: has_light,
    }
}

/// Committed session state as the simulated hardware sees it
#[derive(Default)]
pub(crate) struct ProbeState {
    pub(crate) events: Option<EventSink>,
    pub(crate) sessions_created: usize,
    pub(crate) commits: usize,
    pub(crate) input_id: Option<String>,
    pub(crate) outputs: Vec<OutputKind>,
    pub(crate) mirrored: bool,
    pub(crate) running: bool,
    pub(crate) torch: FlashMode,
    pub(crate) flash_fired: usize,
    pub(crate) photo_requests: Vec<PhotoRequest>,
    pub(crate) held: Vec<(u64, BackendResult<CapturedPhoto>)>,
    pub(crate) recording: bool,
}

/// Inspection and fault-injection handle shared with the sessions
#[derive(Clone, Default)]
pub struct VirtualProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl VirtualProbe {
    pub(crate) fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Physical torch state
    pub fn torch(&self) -> FlashMode {
        self.lock().torch
    }

    /// Number of photos taken with the flash lit
    pub fn flash_fired(&self) -> usize {
        self.lock().flash_fired
    }

    /// Outputs visible after the last commit
    pub fn outputs(&self) -> Vec<OutputKind> {
        self.lock().outputs.clone()
    }

    /// Input visible after the last commit
    pub fn input_id(&self) -> Option<String> {
        self.lock().input_id.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn is_mirrored(&self) -> bool {
        self.lock().mirrored
    }

    pub fn is_recording(&self) -> bool {
        self.lock().recording
    }

    /// Number of configuration commits
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    pub fn sessions_created(&self) -> usize {
        self.lock().sessions_created
    }

    /// Every photo request the session accepted
    pub fn photo_requests(&self) -> Vec<PhotoRequest> {
        self.lock().photo_requests.clone()
    }

    /// Photo results waiting for release
    pub fn held_count(&self) -> usize {
        self.lock().held.len()
    }

    /// Turn the held result at `index` (request order) into a capture failure
    pub fn fail_held(&self, index: usize) -> bool {
        let mut state = self.lock();
        let Some((request_id, result)) = state.held.get_mut(index) else {
            return false;
        };
        *result = Err(BackendError::CaptureFailed("Simulated capture failure".into()));
        debug!(request = *request_id, "Held photo marked as failed");
        true
    }

    /// Deliver held photo results, newest request first
    pub fn release_held_reversed(&self) -> usize {
        let mut state = self.lock();
        let held = std::mem::take(&mut state.held);
        let count = held.len();
        if let Some(events) = state.events.clone() {
            for (request_id, result) in held.into_iter().rev() {
                let _ = events.send(SessionEvent::PhotoCaptured { request_id, result });
            }
        }
        debug!(count, "Released held photos");
        count
    }

    /// Drop the session out of the running state and report a media services reset
    pub fn simulate_media_services_reset(&self) {
        let mut state = self.lock();
        state.running = false;
        if let Some(events) = &state.events {
            let _ = events.send(SessionEvent::RuntimeError(RuntimeError::MediaServicesReset));
        }
        info!("Simulated media services reset");
    }

    /// Report a runtime error that is not a reset
    pub fn simulate_runtime_error(&self, message: &str) {
        let state = self.lock();
        if let Some(events) = &state.events {
            let _ = events.send(SessionEvent::RuntimeError(RuntimeError::Other(
                message.to_string(),
            )));
        }
    }
}

/// Simulated backend
pub struct VirtualBackend {
    behavior: Arc<VirtualBehavior>,
    authorization: Mutex<AuthorizationStatus>,
    probe: VirtualProbe,
}

impl VirtualBackend {
    pub fn new(behavior: VirtualBehavior) -> Self {
        Self {
            authorization: Mutex::new(behavior.authorization),
            behavior: Arc::new(behavior),
            probe: VirtualProbe::default(),
        }
    }

    pub fn probe(&self) -> VirtualProbe {
        self.probe.clone()
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new(VirtualBehavior::default())
    }
}

impl CaptureBackend for VirtualBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Virtual
    }

    fn discover_devices(&self) -> Vec<CameraDevice> {
        debug!(count = self.behavior.devices.len(), "Virtual cameras enumerated");
        self.behavior.devices.clone()
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization
            .lock()
            .map(|status| *status)
            .unwrap_or(AuthorizationStatus::Restricted)
    }

    fn request_access(&self) -> bool {
        let Ok(mut status) = self.authorization.lock() else {
            return false;
        };
        if *status == AuthorizationStatus::NotDetermined {
            *status = if self.behavior.grant_on_request {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            };
        }
        status.is_authorized()
    }

    fn create_session(&self, events: EventSink) -> BackendResult<Box<dyn CaptureSession>> {
        {
            let mut state = self.probe.lock();
            state.events = Some(events.clone());
            state.sessions_created += 1;
        }
        Ok(Box::new(VirtualSession::new(
            events,
            Arc::clone(&self.behavior),
            self.probe.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_access_resolves_once() {
        let backend = VirtualBackend::new(VirtualBehavior {
            authorization: AuthorizationStatus::NotDetermined,
            grant_on_request: false,
            ..Default::default()
        });
        assert!(!backend.request_access());
        assert_eq!(backend.authorization_status(), AuthorizationStatus::Denied);
        assert!(!backend.request_access());
    }

    #[test]
    fn test_session_registers_event_sink() {
        let backend = VirtualBackend::default();
        let probe = backend.probe();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _session = backend.create_session(tx).unwrap();
        assert_eq!(probe.sessions_created(), 1);

        probe.simulate_runtime_error("boom");
        assert!(matches!(
            rx.try_recv(),
            Ok(SessionEvent::RuntimeError(RuntimeError::Other(_)))
        ));
    }

    #[test]
    fn test_back_camera_has_light() {
        let back = virtual_device("b", "Back", CameraPosition::Back);
        let front = virtual_device("f", "Front", CameraPosition::Front);
        assert!(back.has_flash && back.has_torch);
        assert!(!front.has_flash && !front.has_torch);
    }
}
