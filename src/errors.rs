// SPDX-License-Identifier: MPL-2.0

//! Error types for the camera service
//!
//! Two layers:
//! - [`BackendError`] is what platform backends and the session worker report.
//! - [`CameraServiceError`] is the closed taxonomy surfaced to callers of the
//!   high-level capture wrappers.

use std::fmt;

/// Result type alias using CameraServiceError
pub type ServiceResult<T> = Result<T, CameraServiceError>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors surfaced by the high-level service operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraServiceError {
    /// Camera access was denied or restricted
    PermissionDenied,
    /// No usable capture device
    DeviceNotAvailable,
    /// Photo capture did not produce a file
    CaptureFailed,
    /// Recording could not be started or finalized
    RecordingFailed,
    /// The capture session is not configured or not running
    ConfigurationFailed,
    /// The request was abandoned before it completed
    UserCancelled,
    /// Anything else
    Unknown(String),
}

/// Errors reported by capture backends and the session worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Access to the capture device was refused
    PermissionDenied,
    /// Camera device not found
    DeviceNotFound(String),
    /// Operation requires a configured session
    NotConfigured,
    /// Operation requires a running session
    NotRunning,
    /// Session configuration could not be applied
    ConfigurationFailed(String),
    /// Required output is not attached to the session
    OutputUnavailable(String),
    /// Photo capture failed in the pipeline
    CaptureFailed(String),
    /// Recording already in progress
    RecordingInProgress,
    /// No recording in progress
    NoRecordingInProgress,
    /// Recording pipeline failed
    RecordingFailed(String),
    /// Request dropped before completion (session torn down)
    Cancelled,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

/// Configuration load/save errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No platform configuration directory
    NoConfigDir,
    /// Filesystem error
    Io(String),
    /// Malformed configuration file
    Parse(String),
}

impl fmt::Display for CameraServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraServiceError::PermissionDenied => write!(f, "Camera permission denied"),
            CameraServiceError::DeviceNotAvailable => write!(f, "No camera device available"),
            CameraServiceError::CaptureFailed => write!(f, "Photo capture failed"),
            CameraServiceError::RecordingFailed => write!(f, "Video recording failed"),
            CameraServiceError::ConfigurationFailed => {
                write!(f, "Camera session is not configured")
            }
            CameraServiceError::UserCancelled => write!(f, "Cancelled"),
            CameraServiceError::Unknown(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::PermissionDenied => write!(f, "Permission denied"),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::NotConfigured => write!(f, "Session is not configured"),
            BackendError::NotRunning => write!(f, "Session is not running"),
            BackendError::ConfigurationFailed(msg) => write!(f, "Configuration failed: {}", msg),
            BackendError::OutputUnavailable(msg) => write!(f, "Output unavailable: {}", msg),
            BackendError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            BackendError::RecordingInProgress => write!(f, "Recording already in progress"),
            BackendError::NoRecordingInProgress => write!(f, "No recording in progress"),
            BackendError::RecordingFailed(msg) => write!(f, "Recording failed: {}", msg),
            BackendError::Cancelled => write!(f, "Request cancelled"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "No configuration directory on this platform"),
            ConfigError::Io(msg) => write!(f, "Configuration I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Malformed configuration: {}", msg),
        }
    }
}

impl std::error::Error for CameraServiceError {}
impl std::error::Error for BackendError {}
impl std::error::Error for ConfigError {}

impl From<BackendError> for CameraServiceError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::PermissionDenied => CameraServiceError::PermissionDenied,
            BackendError::DeviceNotFound(_) => CameraServiceError::DeviceNotAvailable,
            BackendError::NotConfigured
            | BackendError::NotRunning
            | BackendError::ConfigurationFailed(_) => CameraServiceError::ConfigurationFailed,
            BackendError::CaptureFailed(_) => CameraServiceError::CaptureFailed,
            BackendError::RecordingInProgress
            | BackendError::NoRecordingInProgress
            | BackendError::RecordingFailed(_) => CameraServiceError::RecordingFailed,
            BackendError::Cancelled => CameraServiceError::UserCancelled,
            other => CameraServiceError::Unknown(other.to_string()),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
