// SPDX-License-Identifier: GPL-3.0-only

use super::{VirtualBehavior, VirtualProbe};
use crate::backends::CaptureSession;
use crate::backends::types::*;
use crate::constants::photo::JPEG_QUALITY;
use crate::constants::timing;
use crate::errors::{BackendError, BackendResult};
use crate::flash::FlashMode;
use crate::pipelines::photo::{encode_jpeg, encode_still};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Moving gradient test pattern
fn test_pattern(width: u32, height: u32, tick: u32, dark: bool) -> CameraFrame {
    let stride = width * 4;
    let mut data = vec![0u8; (stride * height) as usize];
    let scale: u32 = if dark { 24 } else { 255 };

    for (y, row) in data.chunks_exact_mut(stride as usize).enumerate() {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let r = ((x as u32 + tick) % width.max(1)) * scale / width.max(1);
            let g = (y as u32 * scale) / height.max(1);
            px[0] = r as u8;
            px[1] = g as u8;
            px[2] = (scale / 2) as u8;
            px[3] = 255;
        }
    }

    CameraFrame {
        width,
        height,
        data: Arc::from(data),
        stride,
        captured_at: Instant::now(),
    }
}

struct FrameThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Simulated capture session
///
/// Configuration is staged locally and published to the probe on commit.
pub struct VirtualSession {
    events: EventSink,
    behavior: Arc<VirtualBehavior>,
    probe: VirtualProbe,
    input: Option<CameraDevice>,
    outputs: BTreeSet<OutputKind>,
    mirrored: bool,
    config_depth: usize,
    /// Input attached or detached inside the current bracket
    input_changed: bool,
    live_frames: Arc<AtomicBool>,
    frames: Option<FrameThread>,
    recording: Option<PathBuf>,
    tick: u32,
}

impl VirtualSession {
    pub(crate) fn new(events: EventSink, behavior: Arc<VirtualBehavior>, probe: VirtualProbe) -> Self {
        Self {
            events,
            behavior,
            probe,
            input: None,
            outputs: BTreeSet::new(),
            mirrored: false,
            config_depth: 0,
            input_changed: false,
            live_frames: Arc::new(AtomicBool::new(false)),
            frames: None,
            recording: None,
            tick: 0,
        }
    }

    fn publish(&self) {
        let mut state = self.probe.lock();
        state.input_id = self.input.as_ref().map(|d| d.id.clone());
        state.outputs = self.outputs.iter().copied().collect();
        state.mirrored = self.mirrored;
        self.live_frames
            .store(self.outputs.contains(&OutputKind::LiveFrames), Ordering::Relaxed);
    }

    fn next_frame(&mut self) -> CameraFrame {
        self.tick = self.tick.wrapping_add(1);
        let (width, height) = self.behavior.frame_size;
        test_pattern(width, height, self.tick, self.behavior.low_light)
    }

    fn spawn_frames(&mut self) {
        if self.frames.is_some() {
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let events = self.events.clone();
        let live = Arc::clone(&self.live_frames);
        let probe = self.probe.clone();
        let (width, height) = self.behavior.frame_size;
        let dark = self.behavior.low_light;
        let thread_stop = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            let mut tick = 0u32;
            while !thread_stop.load(Ordering::Relaxed) {
                if live.load(Ordering::Relaxed) && probe.lock().running {
                    tick = tick.wrapping_add(1);
                    let frame = test_pattern(width, height, tick, dark);
                    if events.send(SessionEvent::Frame(frame)).is_err() {
                        break;
                    }
                }
                std::thread::sleep(timing::VIRTUAL_FRAME_INTERVAL);
            }
        });

        self.frames = Some(FrameThread { stop, handle });
    }

    fn stop_frames(&mut self) {
        if let Some(frames) = self.frames.take() {
            frames.stop.store(true, Ordering::Relaxed);
            let _ = frames.handle.join();
        }
    }

    fn check_startable(&self) -> BackendResult<()> {
        match &self.input {
            None => Err(BackendError::DeviceNotFound("No input attached".into())),
            Some(device) if self.behavior.unstartable_inputs.contains(&device.id) => Err(
                BackendError::ConfigurationFailed(format!("{} is busy", device.name)),
            ),
            Some(_) => Ok(()),
        }
    }

    /// Drop out of the running state when the new input cannot stream
    fn restart_on_new_input(&mut self) {
        if let Err(e) = self.check_startable() {
            warn!(error = %e, "Virtual session lost its stream after input change");
            self.stop_frames();
            self.probe.lock().running = false;
            let _ = self
                .events
                .send(SessionEvent::RuntimeError(RuntimeError::Other(e.to_string())));
        }
    }

    fn has_light(&self) -> bool {
        self.input.as_ref().map(|d| d.has_flash).unwrap_or(false)
    }
}

impl CaptureSession for VirtualSession {
    fn begin_configuration(&mut self) {
        self.config_depth += 1;
    }

    fn commit_configuration(&mut self) {
        self.config_depth = self.config_depth.saturating_sub(1);
        if self.config_depth == 0 {
            self.publish();
            self.probe.lock().commits += 1;
            if std::mem::take(&mut self.input_changed) && self.is_running() {
                self.restart_on_new_input();
            }
        }
    }

    fn can_add_input(&self, device: &CameraDevice) -> bool {
        self.input.is_none()
            && device.is_usable()
            && !self.behavior.rejected_inputs.contains(&device.id)
    }

    fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()> {
        if !self.can_add_input(device) {
            return Err(BackendError::ConfigurationFailed(format!(
                "Cannot add input {}",
                device.name
            )));
        }
        self.input = Some(device.clone());
        self.input_changed = true;
        Ok(())
    }

    fn remove_input(&mut self) {
        if self.input.take().is_some() {
            self.input_changed = true;
        }
    }

    fn input(&self) -> Option<&CameraDevice> {
        self.input.as_ref()
    }

    fn can_add_output(&self, output: OutputKind) -> bool {
        !self.outputs.contains(&output) && !self.behavior.rejected_outputs.contains(&output)
    }

    fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        if !self.can_add_output(output) {
            return Err(BackendError::ConfigurationFailed(format!(
                "Cannot add {} output",
                output
            )));
        }
        self.outputs.insert(output);
        Ok(())
    }

    fn remove_output(&mut self, output: OutputKind) {
        self.outputs.remove(&output);
    }

    fn outputs(&self) -> Vec<OutputKind> {
        self.outputs.iter().copied().collect()
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    fn start_running(&mut self) -> BackendResult<()> {
        self.check_startable()?;
        self.probe.lock().running = true;
        self.spawn_frames();
        info!("Virtual session running");
        Ok(())
    }

    fn stop_running(&mut self) {
        self.stop_recording();
        self.stop_frames();
        self.probe.lock().running = false;
        info!("Virtual session stopped");
    }

    fn is_running(&self) -> bool {
        self.probe.lock().running
    }

    fn supported_photo_codecs(&self) -> Vec<PhotoCodec> {
        self.behavior.photo_codecs.clone()
    }

    fn capture_photo(&mut self, request: PhotoRequest) -> BackendResult<()> {
        if !self.outputs.contains(&OutputKind::Photo) {
            return Err(BackendError::OutputUnavailable("photo".into()));
        }
        if !self.is_running() {
            return Err(BackendError::NotRunning);
        }
        if !self.behavior.photo_codecs.contains(&request.codec) {
            return Err(BackendError::CaptureFailed(format!(
                "Unsupported codec {:?}",
                request.codec
            )));
        }

        let fire = self.has_light()
            && match request.flash {
                FlashMode::Off => false,
                FlashMode::On => true,
                FlashMode::Auto => self.behavior.low_light,
            };

        let result = if self.behavior.fail_photo_capture {
            Err(BackendError::CaptureFailed("Simulated capture failure".into()))
        } else {
            let frame = self.next_frame();
            match request.codec {
                PhotoCodec::Jpeg => encode_still(&frame, PhotoCodec::Jpeg),
                // Raw pattern bytes stand in for the HEIF container
                PhotoCodec::Hevc => Ok(CapturedPhoto {
                    data: frame.data.to_vec(),
                    codec: PhotoCodec::Hevc,
                }),
            }
        };

        debug!(request = request.id, flash = %request.flash, fire, "Virtual photo taken");

        let mut state = self.probe.lock();
        state.photo_requests.push(request);
        if fire {
            state.flash_fired += 1;
        }
        if self.behavior.hold_photos {
            state.held.push((request.id, result));
        } else {
            drop(state);
            let _ = self.events.send(SessionEvent::PhotoCaptured {
                request_id: request.id,
                result,
            });
        }
        Ok(())
    }

    fn set_torch(&mut self, mode: FlashMode) -> BackendResult<()> {
        let has_torch = self.input.as_ref().map(|d| d.has_torch).unwrap_or(false);
        self.probe.lock().torch = if has_torch { mode } else { FlashMode::Off };
        Ok(())
    }

    fn start_recording(&mut self, path: &Path) -> BackendResult<()> {
        if !self.outputs.contains(&OutputKind::MovieFile) {
            return Err(BackendError::OutputUnavailable("movie file".into()));
        }
        if !self.is_running() {
            return Err(BackendError::NotRunning);
        }
        if self.recording.is_some() {
            return Err(BackendError::RecordingInProgress);
        }

        std::fs::File::create(path).map_err(|e| {
            BackendError::RecordingFailed(format!("Failed to create {}: {}", path.display(), e))
        })?;

        self.recording = Some(path.to_path_buf());
        self.probe.lock().recording = true;
        let _ = self.events.send(SessionEvent::RecordingStarted {
            path: path.to_path_buf(),
        });
        info!(path = %path.display(), "Virtual recording started");
        Ok(())
    }

    fn stop_recording(&mut self) {
        let Some(path) = self.recording.take() else {
            return;
        };
        self.probe.lock().recording = false;

        let frame = self.next_frame();
        let result = encode_jpeg(&frame, JPEG_QUALITY).and_then(|jpeg| {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
            file.write_all(&jpeg)?;
            Ok(())
        });
        if let Err(e) = &result {
            warn!(error = %e, "Virtual recording failed to finalize");
        }

        let _ = self
            .events
            .send(SessionEvent::RecordingFinished { path, result });
    }

    fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    fn recording_extension(&self) -> &'static str {
        "mjpeg"
    }
}

impl Drop for VirtualSession {
    fn drop(&mut self) {
        self.stop_frames();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_brightness() {
        let bright = test_pattern(32, 32, 0, false);
        let dark = test_pattern(32, 32, 0, true);
        assert!(bright.average_luma() > dark.average_luma());
        assert!(dark.average_luma() < crate::constants::photo::AUTO_FLASH_LUMA_THRESHOLD);
    }

    #[test]
    fn test_staged_changes_publish_on_commit() {
        let probe = VirtualProbe::default();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let behavior = Arc::new(VirtualBehavior::default());
        let device = behavior.devices[0].clone();
        let mut session = VirtualSession::new(tx, behavior, probe.clone());

        session.begin_configuration();
        session.add_input(&device).unwrap();
        session.add_output(OutputKind::Photo).unwrap();
        assert!(probe.outputs().is_empty());
        assert!(probe.input_id().is_none());

        session.commit_configuration();
        assert_eq!(probe.outputs(), vec![OutputKind::Photo]);
        assert_eq!(probe.input_id(), Some(device.id));
        assert_eq!(probe.commits(), 1);
    }
}
