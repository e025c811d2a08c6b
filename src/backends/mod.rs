// SPDX-License-Identifier: MPL-2.0

//! Capture backend abstraction
//!
//! Everything platform-specific sits behind two traits:
//!
//! ```text
//! ┌─────────────────────┐
//! │    CameraService    │  ← session queue, pending captures, flash state
//! └──────────┬──────────┘
//!            │ owns
//!            ▼
//! ┌─────────────────────┐        SessionEvent
//! │ CaptureSession Trait│ ─────────────────────▶ EventSink (registered at creation)
//! └──────────┬──────────┘
//!            │ created by
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureBackend Trait│  ← discovery, authorization
//! └──────────┬──────────┘
//!       ┌────┴─────┐
//!       ▼          ▼
//!  ┌─────────┐ ┌─────────┐
//!  │GStreamer│ │ Virtual │
//!  └─────────┘ └─────────┘
//! ```
//!
//! Sessions never call back into the coordinator directly. Results of
//! asynchronous work (photos, recordings, frames, runtime errors) are sent on
//! the [`EventSink`] handed to [`CaptureBackend::create_session`].

pub mod gstreamer;
pub mod types;
pub mod virtual_camera;

pub use types::*;

use crate::constants::BitratePreset;
use crate::errors::BackendResult;
use crate::flash::FlashMode;
use std::path::Path;
use std::sync::Arc;

/// Platform entry point: devices, permissions, session factory
pub trait CaptureBackend: Send + Sync {
    /// Backend type identifier
    fn kind(&self) -> BackendKind;

    /// Every capture device the platform reports, in platform order
    ///
    /// Callers filter and order the result; see [`crate::service::discovery`].
    fn discover_devices(&self) -> Vec<CameraDevice>;

    /// Current camera access state
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask for camera access; may block on a user prompt
    fn request_access(&self) -> bool;

    /// Create an empty session that reports to `events`
    fn create_session(&self, events: EventSink) -> BackendResult<Box<dyn CaptureSession>>;
}

/// A capture pipeline connecting one input device to a set of outputs
///
/// All methods are called from the single session worker thread. Input and
/// output changes made between [`begin_configuration`](Self::begin_configuration)
/// and [`commit_configuration`](Self::commit_configuration) become visible
/// together at commit.
pub trait CaptureSession: Send {
    // ===== Configuration =====

    fn begin_configuration(&mut self);

    fn commit_configuration(&mut self);

    fn can_add_input(&self, device: &CameraDevice) -> bool;

    fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()>;

    /// Detach the current input, if any
    fn remove_input(&mut self);

    /// Device currently attached as input
    fn input(&self) -> Option<&CameraDevice>;

    fn can_add_output(&self, output: OutputKind) -> bool;

    fn add_output(&mut self, output: OutputKind) -> BackendResult<()>;

    fn remove_output(&mut self, output: OutputKind);

    /// Attached outputs, sorted
    fn outputs(&self) -> Vec<OutputKind>;

    /// Mirror preview and recording horizontally
    fn set_mirrored(&mut self, mirrored: bool);

    // ===== Run state =====

    /// Start frame flow; restarts the pipeline if it is already built
    fn start_running(&mut self) -> BackendResult<()>;

    fn stop_running(&mut self);

    fn is_running(&self) -> bool;

    // ===== Capture =====

    fn supported_photo_codecs(&self) -> Vec<PhotoCodec>;

    /// Issue a photo request; the result arrives as [`SessionEvent::PhotoCaptured`]
    fn capture_photo(&mut self, request: PhotoRequest) -> BackendResult<()>;

    /// Drive the torch of the current input
    fn set_torch(&mut self, mode: FlashMode) -> BackendResult<()>;

    /// Begin writing to `path`; completion arrives as
    /// [`SessionEvent::RecordingStarted`] and [`SessionEvent::RecordingFinished`]
    fn start_recording(&mut self, path: &Path) -> BackendResult<()>;

    /// Finalize the current recording, if any
    fn stop_recording(&mut self);

    fn is_recording(&self) -> bool;

    /// Container extension of recorded files (without dot)
    fn recording_extension(&self) -> &'static str;
}

/// Create a backend instance for the given type
pub fn backend_for_kind(kind: BackendKind, bitrate: BitratePreset) -> Arc<dyn CaptureBackend> {
    match kind {
        BackendKind::GStreamer => Arc::new(gstreamer::GStreamerBackend::new(bitrate)),
        BackendKind::Virtual => Arc::new(virtual_camera::VirtualBackend::default()),
    }
}
