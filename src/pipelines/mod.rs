// SPDX-License-Identifier: MPL-2.0

//! Still and video encoding
//!
//! Both pipelines consume the RGBA frames the preview already produces, so the
//! camera is opened once and capture never interrupts the preview.
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG bytes  │
//! │   (RGBA)     │     │  - strip alpha    │     │              │
//! │              │     │  - JpegEncoder    │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Video Pipeline   │ ──▶ │   MP4 File   │
//! │   (RGBA)     │     │  - appsrc         │     │              │
//! │              │     │  - H.264 encoder  │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```

pub mod photo;
pub mod video;
