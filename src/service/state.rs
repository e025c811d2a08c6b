// SPDX-License-Identifier: GPL-3.0-only

//! Observable service state

use crate::backends::{AuthorizationStatus, CameraDevice};
use crate::errors::BackendResult;
use crate::flash::{CaptureMode, FlashMode, FlashSettings};
use std::path::PathBuf;

/// Capture session lifecycle
///
/// ```text
/// Uninitialized → Configuring → Stopped ⇄ Running
///                      ▲           │
///                      └─ teardown ┘ (configured cleared)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Configuring,
    Stopped,
    Running,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Uninitialized => write!(f, "uninitialized"),
            SessionPhase::Configuring => write!(f, "configuring"),
            SessionPhase::Stopped => write!(f, "stopped"),
            SessionPhase::Running => write!(f, "running"),
        }
    }
}

/// Snapshot published to observers on every change
#[derive(Debug, Clone, Default)]
pub struct ServiceSnapshot {
    pub capture_mode: CaptureMode,
    pub flash: FlashSettings,
    pub devices: Vec<CameraDevice>,
    pub current_device: Option<CameraDevice>,
    pub phase: SessionPhase,
    pub configured: bool,
    pub is_recording: bool,
    /// Torch value in effect on the current device (off without a torch)
    pub torch: FlashMode,
    pub authorization: AuthorizationStatus,
}

impl ServiceSnapshot {
    /// Flash value for the current capture mode
    pub fn current_flash(&self) -> FlashMode {
        self.flash.current(self.capture_mode)
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }
}

/// Recording progress reported by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Frames are being written to `path`
    Started(PathBuf),
    /// The file at `path` was finalized, or failed
    Finished {
        path: PathBuf,
        result: BackendResult<()>,
    },
}
