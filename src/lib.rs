// SPDX-License-Identifier: MPL-2.0

//! Camera Service - capture session coordination for Linux cameras
//!
//! This library discovers cameras, configures a capture session around one of
//! them, keeps per-mode flash and torch state, and turns platform callbacks into
//! awaitable photo results and recording/preview streams.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`service`]: The [`CameraService`] facade, session worker and device selection
//! - [`backends`]: Platform abstraction (GStreamer and a virtual camera)
//! - [`pipelines`]: Still encoding and MP4 recording
//! - [`flash`]: Capture mode, flash/torch settings and flash LEDs
//! - [`config`]: User configuration handling
//! - [`storage`]: Output file naming
//!
//! # Example
//!
//! ```ignore
//! let config = ServiceConfig::load();
//! let backend = backend_for_kind(config.backend, config.bitrate_preset);
//! let service = CameraService::new(backend, config)?;
//! service.setup().await?;
//! let photo = service.take_photo().await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;
pub mod pipelines;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use backends::{CameraDevice, CameraPosition, backend_for_kind};
pub use config::ServiceConfig;
pub use constants::BitratePreset;
pub use errors::{BackendError, CameraServiceError, ServiceResult};
pub use flash::{CaptureMode, FlashMode};
pub use service::{CameraService, RecordingEvent, ServiceSnapshot, SessionPhase};
