// SPDX-License-Identifier: MPL-2.0

//! MP4 recording from pushed RGBA frames
//!
//! The recorder does not open the camera itself. The preview pipeline keeps
//! running and forwards each frame into an `appsrc`:
//!
//! ```text
//! appsrc (RGBA) → videoconvert → H.264 encoder → h264parse → mp4mux → filesink
//! ```

use crate::backends::types::CameraFrame;
use crate::constants::{BitratePreset, pipeline, timing};
use crate::errors::{BackendError, BackendResult};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Parameters fixed for the lifetime of one recording
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub width: u32,
    pub height: u32,
    pub framerate: i32,
    pub bitrate: BitratePreset,
}

/// One MP4 recording fed by [`VideoRecorder::push_frame`]
pub struct VideoRecorder {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    file_path: PathBuf,
    width: u32,
    height: u32,
    frames: AtomicU64,
    /// Frames rejected because their size changed mid-recording
    skipped: AtomicU64,
}

impl VideoRecorder {
    /// Build and start a recorder writing to `output_path`
    pub fn start(output_path: &Path, settings: &RecorderSettings) -> BackendResult<Self> {
        info!(
            output = %output_path.display(),
            width = settings.width,
            height = settings.height,
            framerate = settings.framerate,
            "Creating video recorder"
        );

        gst::init().map_err(|e| BackendError::RecordingFailed(e.to_string()))?;

        let pipeline = gst::Pipeline::new();

        let appsrc = gst::ElementFactory::make("appsrc")
            .name("record_src")
            .build()
            .map_err(|e| make_error("appsrc", e))?
            .downcast::<AppSrc>()
            .map_err(|_| BackendError::RecordingFailed("Failed to downcast to AppSrc".into()))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", pipeline::OUTPUT_FORMAT)
            .field("width", settings.width as i32)
            .field("height", settings.height as i32)
            .field("framerate", gst::Fraction::new(settings.framerate, 1))
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(true);
        appsrc.set_do_timestamp(true);

        let convert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| make_error("videoconvert", e))?;

        let encoder = select_h264_encoder()?;
        let bitrate_kbps = settings.bitrate.bitrate_kbps(settings.width);
        if encoder.find_property("bitrate").is_some() {
            // x264enc and openh264enc disagree on units (kbit/s vs bit/s)
            let factory = encoder.factory().map(|f| f.name().to_string());
            if factory.as_deref() == Some("openh264enc") {
                encoder.set_property_from_str("bitrate", &(bitrate_kbps * 1000).to_string());
            } else {
                encoder.set_property_from_str("bitrate", &bitrate_kbps.to_string());
            }
        }
        if encoder.find_property("tune").is_some() {
            encoder.set_property_from_str("tune", "zerolatency");
        }

        let parse = gst::ElementFactory::make("h264parse")
            .build()
            .map_err(|e| make_error("h264parse", e))?;
        let mux = gst::ElementFactory::make("mp4mux")
            .build()
            .map_err(|e| make_error("mp4mux", e))?;
        let sink = gst::ElementFactory::make("filesink")
            .property("location", output_path.to_string_lossy().to_string())
            .build()
            .map_err(|e| make_error("filesink", e))?;

        let elements = [
            appsrc.upcast_ref::<gst::Element>(),
            &convert,
            &encoder,
            &parse,
            &mux,
            &sink,
        ];
        pipeline
            .add_many(elements)
            .map_err(|e| BackendError::RecordingFailed(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many(elements)
            .map_err(|e| BackendError::RecordingFailed(format!("Failed to link elements: {}", e)))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| BackendError::RecordingFailed(format!("Failed to start recording: {}", e)))?;

        info!(
            encoder = ?encoder.factory().map(|f| f.name().to_string()),
            bitrate_kbps,
            "Video recorder started"
        );

        Ok(Self {
            pipeline,
            appsrc,
            file_path: output_path.to_path_buf(),
            width: settings.width,
            height: settings.height,
            frames: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Push one preview frame into the encoder
    ///
    /// Frames whose size differs from the recording size are skipped, and
    /// the recording is then reported as failed by [`VideoRecorder::finish`].
    pub fn push_frame(&self, frame: &CameraFrame) -> BackendResult<()> {
        if frame.width != self.width || frame.height != self.height {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return Err(BackendError::RecordingFailed(format!(
                "Frame size {}x{} doesn't match recording {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        let buffer = gst::Buffer::from_slice(frame.data.clone());
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| BackendError::RecordingFailed(format!("Failed to push frame: {:?}", e)))?;

        let count = self.frames.fetch_add(1, Ordering::Relaxed);
        if count % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(frame = count, "Recording frames pushed");
        }
        Ok(())
    }

    /// Send EOS, wait for the muxer to finish the file, and tear down
    pub fn finish(self) -> BackendResult<PathBuf> {
        info!(path = %self.file_path.display(), "Finalizing recording");

        if let Err(e) = self.appsrc.end_of_stream() {
            warn!(error = ?e, "Failed to send EOS to recorder");
        }

        let mut result = Ok(self.file_path.clone());
        if let Some(bus) = self.pipeline.bus()
            && let Some(msg) = bus.timed_pop_filtered(
                gst::ClockTime::from_seconds(timing::EOS_TIMEOUT_SECS),
                &[gst::MessageType::Eos, gst::MessageType::Error],
            )
            && let gst::MessageView::Error(err) = msg.view()
        {
            error!(
                error = %err.error(),
                debug = ?err.debug(),
                "Recorder error while finalizing"
            );
            result = Err(BackendError::RecordingFailed(err.error().to_string()));
        }

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| BackendError::RecordingFailed(format!("Failed to stop pipeline: {}", e)))?;

        let skipped = self.skipped.load(Ordering::Relaxed);
        info!(
            path = %self.file_path.display(),
            frames = self.frames.load(Ordering::Relaxed),
            skipped,
            "Recording finalized"
        );
        result.and_then(|path| check_skipped(path, skipped))
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

fn select_h264_encoder() -> BackendResult<gst::Element> {
    for name in pipeline::H264_ENCODERS {
        match gst::ElementFactory::make(name).build() {
            Ok(encoder) => {
                debug!(encoder = name, "Selected H.264 encoder");
                return Ok(encoder);
            }
            Err(_) => debug!(encoder = name, "Encoder not available"),
        }
    }
    Err(BackendError::RecordingFailed(
        "No H.264 encoder available".to_string(),
    ))
}

/// A recording that lost frames to a size change is incomplete
fn check_skipped(path: PathBuf, skipped: u64) -> BackendResult<PathBuf> {
    if skipped == 0 {
        return Ok(path);
    }
    warn!(path = %path.display(), skipped, "Recording is missing frames");
    Err(BackendError::RecordingFailed(format!(
        "{} frames dropped after the frame size changed",
        skipped
    )))
}

fn make_error(element: &str, err: gst::glib::BoolError) -> BackendError {
    BackendError::RecordingFailed(format!("Failed to create {}: {}", element, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_frames_fail_the_recording() {
        let path = PathBuf::from("/tmp/clip.mp4");
        assert_eq!(check_skipped(path.clone(), 0), Ok(path.clone()));
        assert!(matches!(
            check_skipped(path, 12),
            Err(BackendError::RecordingFailed(msg)) if msg.contains("12 frames")
        ));
    }
}
