// SPDX-License-Identifier: GPL-3.0-only

//! Service configuration
//!
//! Stored as pretty JSON in `<config dir>/camera-service/config.json`. A
//! missing file yields defaults; a malformed one is logged and replaced by
//! defaults so a bad edit never keeps the camera from starting.

use crate::backends::{BackendKind, CameraPosition};
use crate::constants::{APP_DIR_NAME, BitratePreset};
use crate::errors::ConfigError;
use crate::flash::CaptureMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.json";

/// Current on-disk layout version
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub version: u32,
    /// Capture backend to use (GStreamer or virtual)
    pub backend: BackendKind,
    /// Camera to open first; `None` picks the best-ranked device
    pub preferred_position: Option<CameraPosition>,
    /// Ask for HEVC stills when the session supports them
    pub prefer_hevc: bool,
    /// Mirror preview and recordings from front-facing cameras
    pub mirror_front_camera: bool,
    pub default_capture_mode: CaptureMode,
    /// Where photos are written (system temp dir when unset)
    pub photo_directory: Option<PathBuf>,
    /// Where recordings are written (documents dir when unset)
    pub video_directory: Option<PathBuf>,
    /// Video encoder bitrate preset (Low, Medium, High)
    pub bitrate_preset: BitratePreset,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: BackendKind::default(),
            preferred_position: None,
            prefer_hevc: true,
            mirror_front_camera: true,
            default_capture_mode: CaptureMode::Photo,
            photo_directory: None,
            video_directory: None,
            bitrate_preset: BitratePreset::default(),
        }
    }
}

impl ServiceConfig {
    /// Default configuration file location
    pub fn path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::path() {
            Ok(path) => Self::load_or_default(&path),
            Err(e) => {
                warn!(error = %e, "No configuration directory, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid configuration, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file is not an error
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        if config.version != CONFIG_VERSION {
            info!(
                found = config.version,
                expected = CONFIG_VERSION,
                "Configuration version differs, missing fields use defaults"
            );
        }
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Directory for captured photos
    pub fn photo_dir(&self) -> PathBuf {
        self.photo_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Directory for recorded videos
    pub fn video_dir(&self) -> PathBuf {
        self.video_directory.clone().unwrap_or_else(|| {
            dirs::document_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: ServiceConfig = serde_json::from_str(r#"{"prefer_hevc": false}"#).unwrap();
        assert!(!config.prefer_hevc);
        assert!(config.mirror_front_camera);
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_explicit_directories_win() {
        let config = ServiceConfig {
            photo_directory: Some(PathBuf::from("/srv/photos")),
            video_directory: Some(PathBuf::from("/srv/videos")),
            ..Default::default()
        };
        assert_eq!(config.photo_dir(), PathBuf::from("/srv/photos"));
        assert_eq!(config.video_dir(), PathBuf::from("/srv/videos"));
    }

    #[test]
    fn test_default_video_dir_is_app_owned() {
        assert!(ServiceConfig::default().video_dir().ends_with(APP_DIR_NAME));
    }
}
