// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture backends

use crate::errors::BackendResult;
use crate::flash::FlashMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Capture backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BackendKind {
    /// GStreamer device monitor and pipelines
    #[default]
    GStreamer,
    /// In-process simulated camera
    Virtual,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::GStreamer => write!(f, "GStreamer"),
            BackendKind::Virtual => write!(f, "virtual"),
        }
    }
}

/// Which way the camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraPosition {
    Back,
    Front,
    External,
    #[default]
    Unspecified,
}

impl CameraPosition {
    /// Parse a platform location string ("front", "back", "external")
    pub fn from_location(location: &str) -> Self {
        match location.trim().to_ascii_lowercase().as_str() {
            "back" | "rear" => CameraPosition::Back,
            "front" | "user" => CameraPosition::Front,
            "external" => CameraPosition::External,
            _ => CameraPosition::Unspecified,
        }
    }
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::External => write!(f, "external"),
            CameraPosition::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Lens/sensor class of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    /// Standard wide-angle module (the default camera on each side)
    #[default]
    WideAngle,
    UltraWide,
    Telephoto,
    /// USB or otherwise detachable camera
    External,
    Other,
}

/// Represents a capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Stable identifier for this device
    pub id: String,
    pub name: String,
    /// Source locator understood by the backend (e.g. `/dev/video0`, `pipewire:42`)
    pub path: String,
    pub position: CameraPosition,
    pub device_type: DeviceType,
    pub connected: bool,
    pub suspended: bool,
    pub has_flash: bool,
    pub has_torch: bool,
}

impl CameraDevice {
    /// Connected and not suspended
    pub fn is_usable(&self) -> bool {
        self.connected && !self.suspended
    }

    /// Front cameras preview and record mirrored
    pub fn is_front_facing(&self) -> bool {
        self.position == CameraPosition::Front
    }
}

/// Outputs a session can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputKind {
    /// Still photos
    Photo,
    /// Live preview frames
    LiveFrames,
    /// Recorded movie file
    MovieFile,
}

impl OutputKind {
    /// The fixed output set of a configured session, in the order it is attached
    pub const ALL: [OutputKind; 3] = [
        OutputKind::Photo,
        OutputKind::LiveFrames,
        OutputKind::MovieFile,
    ];
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputKind::Photo => write!(f, "photo"),
            OutputKind::LiveFrames => write!(f, "live frames"),
            OutputKind::MovieFile => write!(f, "movie file"),
        }
    }
}

/// Still image codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoCodec {
    Jpeg,
    /// High-efficiency (HEIF container)
    Hevc,
}

impl PhotoCodec {
    pub fn extension(&self) -> &'static str {
        match self {
            PhotoCodec::Jpeg => "jpg",
            PhotoCodec::Hevc => "heic",
        }
    }

    /// HEVC when preferred and supported, otherwise JPEG
    pub fn select(supported: &[PhotoCodec], prefer_hevc: bool) -> PhotoCodec {
        if prefer_hevc && supported.contains(&PhotoCodec::Hevc) {
            PhotoCodec::Hevc
        } else {
            PhotoCodec::Jpeg
        }
    }
}

/// Camera access state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        *self == AuthorizationStatus::Authorized
    }
}

/// A single photo request handed to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoRequest {
    /// Key into the pending capture table
    pub id: u64,
    pub flash: FlashMode,
    pub codec: PhotoCodec,
}

/// Encoded still returned by the session
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    pub data: Vec<u8>,
    pub codec: PhotoCodec,
}

/// A single RGBA frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, `stride` bytes per row
    pub data: Arc<[u8]>,
    pub stride: u32,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Mean luma (BT.601) sampled on a sparse grid
    pub fn average_luma(&self) -> u8 {
        if self.width == 0 || self.height == 0 {
            return 0;
        }

        let step_x = (self.width / 32).max(1);
        let step_y = (self.height / 32).max(1);
        let mut total: u64 = 0;
        let mut samples: u64 = 0;

        for y in (0..self.height).step_by(step_y as usize) {
            for x in (0..self.width).step_by(step_x as usize) {
                let offset = (y * self.stride + x * 4) as usize;
                let Some(px) = self.data.get(offset..offset + 3) else {
                    continue;
                };
                let luma = (299 * px[0] as u64 + 587 * px[1] as u64 + 114 * px[2] as u64) / 1000;
                total += luma;
                samples += 1;
            }
        }

        if samples == 0 {
            0
        } else {
            (total / samples) as u8
        }
    }
}

/// Asynchronous notification raised by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The media stack restarted underneath the session; restart is expected to work
    MediaServicesReset,
    /// Anything else; reported, not retried
    Other(String),
}

/// Callback from a session to the coordinator
#[derive(Debug)]
pub enum SessionEvent {
    /// A photo request finished
    PhotoCaptured {
        request_id: u64,
        result: BackendResult<CapturedPhoto>,
    },
    /// The movie output began writing
    RecordingStarted { path: PathBuf },
    /// The movie output finished (successfully or not)
    RecordingFinished {
        path: PathBuf,
        result: BackendResult<()>,
    },
    /// A live preview frame
    Frame(CameraFrame),
    /// The platform reported a session runtime error
    RuntimeError(RuntimeError),
}

/// Registered callback channel for session events
pub type EventSink = tokio::sync::mpsc::UnboundedSender<SessionEvent>;

/// Receiving end of the event channel, owned by the coordinator
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<SessionEvent>;
