// SPDX-License-Identifier: MPL-2.0

//! GStreamer capture session
//!
//! ```text
//! source → videoconvert → [videoflip] → video/x-raw,format=RGBA → appsink
//!                                                                   │
//!                       ┌───────────────────────────┬───────────────┼──────────────┐
//!                       ▼                           ▼               ▼              ▼
//!                 live frame events          armed photo → JPEG   recorder appsrc  luma
//! ```
//!
//! Outputs are logical: attaching the photo or movie output enables the
//! corresponding branch of the frame callback. Input and mirroring changes made
//! inside a configuration bracket rebuild the pipeline once, at commit.

use crate::backends::CaptureSession;
use crate::backends::types::*;
use crate::constants::{BitratePreset, photo, pipeline, timing};
use crate::errors::{BackendError, BackendResult};
use crate::flash::{self, FlashDevice, FlashMode};
use crate::pipelines::photo::encode_still;
use crate::pipelines::video::{RecorderSettings, VideoRecorder};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A photo request waiting for a frame
struct ArmedPhoto {
    request: PhotoRequest,
    /// First frame timestamp that may be used (after flash pre-fire)
    not_before: Instant,
    flash_lit: bool,
}

enum RecordingSlot {
    Idle,
    /// Waiting for the first frame to learn the recording size
    Armed(PathBuf),
    Active(VideoRecorder),
}

/// State touched by the streaming thread
struct Shared {
    events: EventSink,
    leds: Arc<Vec<FlashDevice>>,
    photos: Mutex<VecDeque<ArmedPhoto>>,
    recording: Mutex<RecordingSlot>,
    live_frames: AtomicBool,
    torch_lit: AtomicBool,
    last_luma: AtomicU8,
    frame_counter: AtomicU64,
    bitrate: BitratePreset,
}

impl Shared {
    fn on_frame(&self, frame: CameraFrame, framerate: i32) {
        let frame_num = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        self.last_luma.store(frame.average_luma(), Ordering::Relaxed);

        self.deliver_photos(&frame);
        self.feed_recorder(&frame, framerate);

        if self.live_frames.load(Ordering::Relaxed) {
            if self.events.send(SessionEvent::Frame(frame)).is_err() && frame_num % 30 == 0 {
                debug!(frame = frame_num, "No event receiver, frame dropped");
            }
        }
    }

    fn deliver_photos(&self, frame: &CameraFrame) {
        let ready: Vec<ArmedPhoto> = {
            let Ok(mut queue) = self.photos.lock() else {
                return;
            };
            if queue.is_empty() {
                return;
            }
            let now = frame.captured_at;
            let mut ready = Vec::new();
            let mut waiting = VecDeque::new();
            while let Some(armed) = queue.pop_front() {
                if armed.not_before <= now {
                    ready.push(armed);
                } else {
                    waiting.push_back(armed);
                }
            }
            *queue = waiting;
            ready
        };

        if ready.iter().any(|armed| armed.flash_lit) && !self.flash_still_needed() {
            flash::all_off(&self.leds);
        }

        for armed in ready {
            let events = self.events.clone();
            let frame = frame.clone();
            std::thread::spawn(move || {
                let result = encode_still(&frame, armed.request.codec);
                if let Err(e) = &result {
                    warn!(request = armed.request.id, error = %e, "Still encoding failed");
                }
                let _ = events.send(SessionEvent::PhotoCaptured {
                    request_id: armed.request.id,
                    result,
                });
            });
        }
    }

    /// LEDs stay lit while the torch is on or another flash photo is queued
    fn flash_still_needed(&self) -> bool {
        if self.torch_lit.load(Ordering::Relaxed) {
            return true;
        }
        self.photos
            .lock()
            .map(|q| q.iter().any(|armed| armed.flash_lit))
            .unwrap_or(false)
    }

    fn feed_recorder(&self, frame: &CameraFrame, framerate: i32) {
        let Ok(mut slot) = self.recording.lock() else {
            return;
        };

        match &*slot {
            RecordingSlot::Idle => {}
            RecordingSlot::Armed(path) => {
                let path = path.clone();
                let settings = RecorderSettings {
                    width: frame.width,
                    height: frame.height,
                    framerate,
                    bitrate: self.bitrate,
                };
                match VideoRecorder::start(&path, &settings) {
                    Ok(recorder) => {
                        if let Err(e) = recorder.push_frame(frame) {
                            warn!(error = %e, "Failed to push first recording frame");
                        }
                        *slot = RecordingSlot::Active(recorder);
                        let _ = self.events.send(SessionEvent::RecordingStarted { path });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to start recorder");
                        *slot = RecordingSlot::Idle;
                        let _ = self.events.send(SessionEvent::RecordingFinished {
                            path,
                            result: Err(e),
                        });
                    }
                }
            }
            RecordingSlot::Active(recorder) => {
                if let Err(e) = recorder.push_frame(frame) {
                    debug!(error = %e, "Recording frame skipped");
                }
            }
        }
    }

    /// Fail every queued photo request
    fn fail_pending_photos(&self, reason: &str) {
        let drained: Vec<ArmedPhoto> = match self.photos.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => return,
        };
        for armed in drained {
            let _ = self.events.send(SessionEvent::PhotoCaptured {
                request_id: armed.request.id,
                result: Err(BackendError::CaptureFailed(reason.to_string())),
            });
        }
    }
}

/// Running preview pipeline plus its bus watcher
struct Preview {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    bus_stop: Arc<AtomicBool>,
    bus_thread: Option<JoinHandle<()>>,
}

impl Preview {
    fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.bus_stop.store(true, Ordering::SeqCst);
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop preview pipeline");
        }
        let _ = self
            .pipeline
            .state(gstreamer::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS));

        if let Some(handle) = self.bus_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// GStreamer implementation of [`CaptureSession`]
pub struct GStreamerSession {
    shared: Arc<Shared>,
    input: Option<CameraDevice>,
    outputs: BTreeSet<OutputKind>,
    mirrored: bool,
    configuring: bool,
    /// Input or mirroring changed inside the current bracket
    dirty: bool,
    preview: Option<Preview>,
}

impl GStreamerSession {
    pub fn new(events: EventSink, leds: Arc<Vec<FlashDevice>>, bitrate: BitratePreset) -> Self {
        Self {
            shared: Arc::new(Shared {
                events,
                leds,
                photos: Mutex::new(VecDeque::new()),
                recording: Mutex::new(RecordingSlot::Idle),
                live_frames: AtomicBool::new(false),
                torch_lit: AtomicBool::new(false),
                last_luma: AtomicU8::new(u8::MAX),
                frame_counter: AtomicU64::new(0),
                bitrate,
            }),
            input: None,
            outputs: BTreeSet::new(),
            mirrored: false,
            configuring: false,
            dirty: false,
            preview: None,
        }
    }

    fn pipeline_description(&self, device: &CameraDevice) -> String {
        let flip = if self.mirrored {
            "videoflip method=horizontal-flip ! "
        } else {
            ""
        };
        format!(
            "{} ! videoconvert ! {}video/x-raw,format={} ! appsink name=sink",
            super::source_description(&device.path),
            flip,
            pipeline::OUTPUT_FORMAT
        )
    }

    fn build_preview(&self, device: &CameraDevice) -> BackendResult<Preview> {
        let description = self.pipeline_description(device);
        info!(device = %device.name, pipeline = %description, "Building preview pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| BackendError::ConfigurationFailed(e.to_string()))?
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| BackendError::ConfigurationFailed("Failed to cast to pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::ConfigurationFailed("Failed to get appsink".into()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| BackendError::ConfigurationFailed("Failed to cast appsink".into()))?;

        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let shared = Arc::clone(&self.shared);
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
                        return Ok(gstreamer::FlowSuccess::Ok);
                    }
                    let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                    let info =
                        VideoInfo::from_caps(caps).map_err(|_| gstreamer::FlowError::Error)?;
                    let map = buffer
                        .map_readable()
                        .map_err(|_| gstreamer::FlowError::Error)?;

                    let fps = info.fps();
                    let framerate = if fps.numer() > 0 && fps.denom() > 0 {
                        (fps.numer() / fps.denom()).max(1)
                    } else {
                        pipeline::DEFAULT_FRAMERATE
                    };

                    let frame = CameraFrame {
                        width: info.width(),
                        height: info.height(),
                        data: Arc::from(map.as_slice()),
                        stride: info.stride()[0] as u32,
                        captured_at: Instant::now(),
                    };
                    drop(map);

                    shared.on_frame(frame, framerate);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| BackendError::ConfigurationFailed(format!("Failed to start pipeline: {}", e)))?;

        let (result, state, pending) = pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(?result, ?state, ?pending, "Preview pipeline state");
        if result.is_err() {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(BackendError::ConfigurationFailed(
                "Preview pipeline failed to reach PLAYING".into(),
            ));
        }

        let bus_stop = Arc::new(AtomicBool::new(false));
        let bus_thread = pipeline.bus().map(|bus| {
            let stop = Arc::clone(&bus_stop);
            let events = self.shared.events.clone();
            std::thread::spawn(move || watch_bus(bus, stop, events))
        });

        Ok(Preview {
            pipeline,
            appsink,
            bus_stop,
            bus_thread,
        })
    }

    fn has_output(&self, output: OutputKind) -> bool {
        self.outputs.contains(&output)
    }

    fn input_has_light(&self) -> bool {
        self.input
            .as_ref()
            .map(|d| d.has_flash || d.has_torch)
            .unwrap_or(false)
            && !self.shared.leds.is_empty()
    }

    fn is_dark(&self) -> bool {
        self.shared.last_luma.load(Ordering::Relaxed) < photo::AUTO_FLASH_LUMA_THRESHOLD
    }
}

impl CaptureSession for GStreamerSession {
    fn begin_configuration(&mut self) {
        self.configuring = true;
    }

    fn commit_configuration(&mut self) {
        self.configuring = false;
        self.shared
            .live_frames
            .store(self.has_output(OutputKind::LiveFrames), Ordering::Relaxed);

        if std::mem::take(&mut self.dirty) && self.preview.is_some() {
            info!("Configuration changed while running, rebuilding preview");
            if let Err(e) = self.start_running() {
                error!(error = %e, "Failed to rebuild preview after configuration change");
                let _ = self
                    .shared
                    .events
                    .send(SessionEvent::RuntimeError(RuntimeError::Other(e.to_string())));
            }
        }
    }

    fn can_add_input(&self, device: &CameraDevice) -> bool {
        self.input.is_none() && device.is_usable()
    }

    fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()> {
        if !self.can_add_input(device) {
            return Err(BackendError::ConfigurationFailed(format!(
                "Cannot add input {}",
                device.name
            )));
        }
        self.input = Some(device.clone());
        self.dirty = true;
        Ok(())
    }

    fn remove_input(&mut self) {
        if self.input.take().is_some() {
            self.dirty = true;
        }
    }

    fn input(&self) -> Option<&CameraDevice> {
        self.input.as_ref()
    }

    fn can_add_output(&self, output: OutputKind) -> bool {
        !self.has_output(output)
    }

    fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        if !self.outputs.insert(output) {
            return Err(BackendError::ConfigurationFailed(format!(
                "Output {} already attached",
                output
            )));
        }
        Ok(())
    }

    fn remove_output(&mut self, output: OutputKind) {
        self.outputs.remove(&output);
    }

    fn outputs(&self) -> Vec<OutputKind> {
        self.outputs.iter().copied().collect()
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        if self.mirrored != mirrored {
            self.mirrored = mirrored;
            self.dirty = true;
        }
    }

    fn start_running(&mut self) -> BackendResult<()> {
        let device = self
            .input
            .clone()
            .ok_or_else(|| BackendError::DeviceNotFound("No input attached".into()))?;

        if let Some(preview) = self.preview.take() {
            preview.stop();
        }

        self.shared
            .live_frames
            .store(self.has_output(OutputKind::LiveFrames), Ordering::Relaxed);
        self.preview = Some(self.build_preview(&device)?);
        info!(device = %device.name, "Session running");
        Ok(())
    }

    fn stop_running(&mut self) {
        self.stop_recording();
        if let Some(preview) = self.preview.take() {
            preview.stop();
            info!("Session stopped");
        }
        self.shared.fail_pending_photos("Session stopped");
    }

    fn is_running(&self) -> bool {
        self.preview.is_some()
    }

    fn supported_photo_codecs(&self) -> Vec<PhotoCodec> {
        vec![PhotoCodec::Jpeg]
    }

    fn capture_photo(&mut self, request: PhotoRequest) -> BackendResult<()> {
        if !self.has_output(OutputKind::Photo) {
            return Err(BackendError::OutputUnavailable("photo".into()));
        }
        if !self.is_running() {
            return Err(BackendError::NotRunning);
        }
        if !self.supported_photo_codecs().contains(&request.codec) {
            return Err(BackendError::CaptureFailed(format!(
                "Unsupported codec {:?}",
                request.codec
            )));
        }

        let fire = self.input_has_light()
            && match request.flash {
                FlashMode::Off => false,
                FlashMode::On => true,
                FlashMode::Auto => self.is_dark(),
            };

        let now = Instant::now();
        let not_before = if fire {
            flash::all_on(&self.shared.leds);
            now + photo::FLASH_PRE_FIRE
        } else {
            now
        };

        debug!(request = request.id, flash = %request.flash, fire, "Photo armed");

        self.shared
            .photos
            .lock()
            .map_err(|_| BackendError::Other("Photo queue poisoned".into()))?
            .push_back(ArmedPhoto {
                request,
                not_before,
                flash_lit: fire,
            });
        Ok(())
    }

    fn set_torch(&mut self, mode: FlashMode) -> BackendResult<()> {
        // Turning off never depends on the input: it may already be detached
        let lit = self.input_has_light()
            && match mode {
                FlashMode::Off => false,
                FlashMode::On => true,
                FlashMode::Auto => self.is_dark(),
            };
        self.shared.torch_lit.store(lit, Ordering::Relaxed);

        if lit {
            flash::all_on(&self.shared.leds);
        } else if !self.shared.flash_still_needed() {
            flash::all_off(&self.shared.leds);
        }
        debug!(torch = %mode, lit, "Torch updated");
        Ok(())
    }

    fn start_recording(&mut self, path: &Path) -> BackendResult<()> {
        if !self.has_output(OutputKind::MovieFile) {
            return Err(BackendError::OutputUnavailable("movie file".into()));
        }
        if !self.is_running() {
            return Err(BackendError::NotRunning);
        }

        let mut slot = self
            .shared
            .recording
            .lock()
            .map_err(|_| BackendError::Other("Recording slot poisoned".into()))?;
        if !matches!(*slot, RecordingSlot::Idle) {
            return Err(BackendError::RecordingInProgress);
        }
        *slot = RecordingSlot::Armed(path.to_path_buf());
        info!(path = %path.display(), "Recording armed");
        Ok(())
    }

    fn stop_recording(&mut self) {
        let previous = match self.shared.recording.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, RecordingSlot::Idle),
            Err(_) => return,
        };

        match previous {
            RecordingSlot::Idle => {}
            RecordingSlot::Armed(path) => {
                let _ = self.shared.events.send(SessionEvent::RecordingFinished {
                    path,
                    result: Err(BackendError::RecordingFailed(
                        "Stopped before any frame arrived".into(),
                    )),
                });
            }
            RecordingSlot::Active(recorder) => {
                let events = self.shared.events.clone();
                std::thread::spawn(move || {
                    let path = recorder.path().to_path_buf();
                    let result = recorder.finish().map(|_| ());
                    let _ = events.send(SessionEvent::RecordingFinished { path, result });
                });
            }
        }
    }

    fn is_recording(&self) -> bool {
        self.shared
            .recording
            .lock()
            .map(|slot| !matches!(*slot, RecordingSlot::Idle))
            .unwrap_or(false)
    }

    fn recording_extension(&self) -> &'static str {
        "mp4"
    }
}

impl Drop for GStreamerSession {
    fn drop(&mut self) {
        self.stop_running();
        if self.shared.torch_lit.swap(false, Ordering::Relaxed) {
            flash::all_off(&self.shared.leds);
        }
    }
}

/// Forward pipeline errors as runtime errors until `stop` is set
fn watch_bus(bus: gstreamer::Bus, stop: Arc<AtomicBool>, events: EventSink) {
    let poll = gstreamer::ClockTime::from_mseconds(timing::BUS_POLL_INTERVAL.as_millis() as u64);
    while !stop.load(Ordering::SeqCst) {
        let Some(msg) = bus.timed_pop_filtered(poll, &[gstreamer::MessageType::Error]) else {
            continue;
        };
        if let gstreamer::MessageView::Error(err) = msg.view() {
            error!(
                error = %err.error(),
                debug = ?err.debug(),
                source = ?err.src().map(|s| s.name()),
                "Preview pipeline error"
            );
            // Resource errors (device vanished, busy) are what a restart can fix
            let runtime_error = if err.error().is::<gstreamer::ResourceError>() {
                RuntimeError::MediaServicesReset
            } else {
                RuntimeError::Other(err.error().to_string())
            };
            let _ = events.send(SessionEvent::RuntimeError(runtime_error));
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::virtual_device;
    use crate::service::session::SessionCore;
    use crate::service::ServiceSnapshot;

    fn fake_leds(dir: &Path) -> Arc<Vec<FlashDevice>> {
        let led = dir.join("white:flash");
        std::fs::create_dir(&led).unwrap();
        std::fs::write(led.join("max_brightness"), "255\n").unwrap();
        std::fs::write(led.join("brightness"), "0\n").unwrap();
        Arc::new(FlashDevice::discover_in(dir))
    }

    fn brightness(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("white:flash").join("brightness")).unwrap()
    }

    fn back() -> CameraDevice {
        virtual_device("back", "Back", CameraPosition::Back)
    }

    fn front() -> CameraDevice {
        virtual_device("front", "Front", CameraPosition::Front)
    }

    fn frame() -> CameraFrame {
        CameraFrame {
            width: 4,
            height: 4,
            data: Arc::from(vec![128u8; 64]),
            stride: 16,
            captured_at: Instant::now(),
        }
    }

    fn arm_flash_photo(session: &GStreamerSession, id: u64) {
        session.shared.photos.lock().unwrap().push_back(ArmedPhoto {
            request: PhotoRequest {
                id,
                flash: FlashMode::On,
                codec: PhotoCodec::Jpeg,
            },
            not_before: Instant::now(),
            flash_lit: true,
        });
    }

    #[test]
    fn test_torch_follows_mode_on_lit_camera() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut session = GStreamerSession::new(tx, fake_leds(dir.path()), BitratePreset::default());
        session.add_input(&back()).unwrap();

        session.set_torch(FlashMode::On).unwrap();
        assert_eq!(brightness(dir.path()), "255");

        session.set_torch(FlashMode::Off).unwrap();
        assert_eq!(brightness(dir.path()), "0");
    }

    #[test]
    fn test_torch_released_on_camera_without_light() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut session = GStreamerSession::new(tx, fake_leds(dir.path()), BitratePreset::default());
        session.add_input(&back()).unwrap();
        session.set_torch(FlashMode::On).unwrap();
        assert_eq!(brightness(dir.path()), "255");

        // Video mode keeps asking for the torch after the switch
        session.remove_input();
        session.add_input(&front()).unwrap();
        session.set_torch(FlashMode::On).unwrap();
        assert_eq!(brightness(dir.path()), "0");
        assert!(!session.shared.torch_lit.load(Ordering::Relaxed));

        // Photo mode on the same camera stays dark
        session.set_torch(FlashMode::Off).unwrap();
        assert_eq!(brightness(dir.path()), "0");
    }

    #[test]
    fn test_teardown_turns_torch_off() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let session = GStreamerSession::new(tx, fake_leds(dir.path()), BitratePreset::default());
        let (state, _) = tokio::sync::watch::channel(ServiceSnapshot::default());
        let mut core = SessionCore::new(Box::new(session), true, Arc::new(state));

        assert!(core.configure(Some(back())));
        core.set_torch(FlashMode::On).unwrap();
        assert_eq!(brightness(dir.path()), "255");

        core.teardown();
        assert_eq!(brightness(dir.path()), "0");
        assert!(!core.is_configured());
    }

    #[test]
    fn test_flash_released_after_photo_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut session = GStreamerSession::new(tx, fake_leds(dir.path()), BitratePreset::default());
        session.add_input(&back()).unwrap();

        flash::all_on(&session.shared.leds);
        arm_flash_photo(&session, 7);
        session.shared.deliver_photos(&frame());
        assert_eq!(brightness(dir.path()), "0");

        match rx.blocking_recv() {
            Some(SessionEvent::PhotoCaptured { request_id, result }) => {
                assert_eq!(request_id, 7);
                assert!(result.is_ok());
            }
            _ => panic!("expected a photo result"),
        }
    }

    #[test]
    fn test_flash_photo_leaves_lit_torch_on() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut session = GStreamerSession::new(tx, fake_leds(dir.path()), BitratePreset::default());
        session.add_input(&back()).unwrap();
        session.set_torch(FlashMode::On).unwrap();

        arm_flash_photo(&session, 1);
        arm_flash_photo(&session, 2);
        session.shared.deliver_photos(&frame());
        assert_eq!(brightness(dir.path()), "255");

        session.set_torch(FlashMode::Off).unwrap();
        assert_eq!(brightness(dir.path()), "0");
    }
}
