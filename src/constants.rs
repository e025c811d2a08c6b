// SPDX-License-Identifier: GPL-3.0-only

//! Service-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Directory name used under the platform config/documents directories
pub const APP_DIR_NAME: &str = "camera-service";

/// Name of the dedicated session worker thread
pub const SESSION_THREAD_NAME: &str = "camera-session";

/// Video encoder bitrate presets
///
/// Target bitrate scales with the recorded width; presets trade quality for
/// file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    Low,
    #[default]
    Medium,
    High,
}

impl BitratePreset {
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Bitrate in kbps for a frame of the given width
    ///
    /// - below 1280: 1 / 2 / 4 Mbps
    /// - 1280: 2.5 / 5 / 10 Mbps
    /// - 1920: 4 / 8 / 16 Mbps
    /// - 2560: 8 / 16 / 32 Mbps
    /// - 3840 and above: 15 / 30 / 50 Mbps
    pub fn bitrate_kbps(&self, width: u32) -> u32 {
        let row: [u32; 3] = match width {
            w if w >= 3840 => [15_000, 30_000, 50_000],
            w if w >= 2560 => [8_000, 16_000, 32_000],
            w if w >= 1920 => [4_000, 8_000, 16_000],
            w if w >= 1280 => [2_500, 5_000, 10_000],
            _ => [1_000, 2_000, 4_000],
        };
        match self {
            BitratePreset::Low => row[0],
            BitratePreset::Medium => row[1],
            BitratePreset::High => row[2],
        }
    }
}

/// Photo output
pub mod photo {
    /// JPEG quality used when encoding stills from the preview stream
    pub const JPEG_QUALITY: u8 = 92;

    /// Time the flash LED is lit before the frame used for the still is taken
    pub const FLASH_PRE_FIRE: std::time::Duration = std::time::Duration::from_millis(150);

    /// Average luma (0-255) under which auto flash fires
    pub const AUTO_FLASH_LUMA_THRESHOLD: u8 = 60;
}

/// GStreamer pipeline settings
pub mod pipeline {
    /// Maximum appsink buffer queue (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Output pixel format for the preview appsink
    pub const OUTPUT_FORMAT: &str = "RGBA";

    /// Fallback recording framerate when the source does not report one
    pub const DEFAULT_FRAMERATE: i32 = 30;

    /// H.264 encoders tried in order for recording
    pub const H264_ENCODERS: &[&str] = &["x264enc", "openh264enc", "vah264enc", "v4l2h264enc"];
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Time allowed for the muxer to finalize after EOS
    pub const EOS_TIMEOUT_SECS: u64 = 5;

    /// Bus polling interval for runtime error detection
    pub const BUS_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Frame interval of the virtual camera (~30 fps)
    pub const VIRTUAL_FRAME_INTERVAL: Duration = Duration::from_millis(33);
}

/// Application information utilities
pub mod app_info {
    /// Version string from build time
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
