// SPDX-License-Identifier: MPL-2.0

//! Still encoding from RGBA frames

use crate::backends::types::{CameraFrame, CapturedPhoto, PhotoCodec};
use crate::constants::photo::JPEG_QUALITY;
use crate::errors::{BackendError, BackendResult};
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

/// Encode `frame` with `codec`
///
/// Only JPEG has an encoder here; backends that advertise HEVC encode it
/// themselves.
pub fn encode_still(frame: &CameraFrame, codec: PhotoCodec) -> BackendResult<CapturedPhoto> {
    match codec {
        PhotoCodec::Jpeg => Ok(CapturedPhoto {
            data: encode_jpeg(frame, JPEG_QUALITY)?,
            codec,
        }),
        PhotoCodec::Hevc => Err(BackendError::CaptureFailed(
            "No HEVC still encoder available".to_string(),
        )),
    }
}

/// Encode an RGBA frame as JPEG, dropping alpha and row padding
pub fn encode_jpeg(frame: &CameraFrame, quality: u8) -> BackendResult<Vec<u8>> {
    let rgb = rgba_to_rgb(frame)?;

    let mut out = Vec::with_capacity(rgb.len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| BackendError::CaptureFailed(format!("JPEG encoding failed: {}", e)))?;

    debug!(
        width = frame.width,
        height = frame.height,
        bytes = out.len(),
        "Encoded JPEG still"
    );
    Ok(out)
}

fn rgba_to_rgb(frame: &CameraFrame) -> BackendResult<Vec<u8>> {
    let row_bytes = frame.width as usize * 4;
    let stride = frame.stride as usize;
    if stride < row_bytes || frame.data.len() < stride * (frame.height as usize).saturating_sub(1) + row_bytes {
        return Err(BackendError::CaptureFailed(format!(
            "Frame buffer too small for {}x{} (stride {}, {} bytes)",
            frame.width,
            frame.height,
            frame.stride,
            frame.data.len()
        )));
    }

    let mut rgb = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
    for row in frame.data.chunks(stride).take(frame.height as usize) {
        for px in row[..row_bytes].chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
    }
    Ok(rgb)
}
