// SPDX-License-Identifier: GPL-3.0-only

//! Camera service facade
//!
//! ```text
//!  caller ──▶ CameraService ──jobs──▶ SessionQueue ──▶ SessionCore ──▶ CaptureSession
//!                 │   ▲                                                   │
//!                 │   └──── watch<ServiceSnapshot> ◀──────────────────────┤
//!                 │                                                       │ SessionEvent
//!                 ▼                                                       ▼
//!          PendingCaptures ◀──── resolve(id) ───── event dispatcher task ◀┘
//!                                                    │          │
//!                                    broadcast<RecordingEvent>  preview frames
//! ```
//!
//! Low-level operations (`capture_photo`, `start_video_recording`, ...) report
//! failure as `None` or do nothing. The high-level wrappers (`take_photo`,
//! `start_recording`, `finish_recording`) check preconditions first and report
//! [`CameraServiceError`].

pub mod discovery;
mod pending;
pub mod session;
mod state;

pub use pending::PendingCaptures;
pub use session::{SessionCore, SessionQueue};
pub use state::{RecordingEvent, ServiceSnapshot, SessionPhase};

use crate::backends::{
    AuthorizationStatus, CameraDevice, CameraFrame, CaptureBackend, EventReceiver, RuntimeError,
    SessionEvent,
};
use crate::config::ServiceConfig;
use crate::errors::{BackendError, CameraServiceError, ServiceResult};
use crate::flash::{CaptureMode, FlashMode};
use crate::storage;
use futures::Stream;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const RECORDING_EVENT_CAPACITY: usize = 16;

type PreviewSlot = Arc<Mutex<Option<mpsc::UnboundedSender<CameraFrame>>>>;

/// Coordinator between callers and the capture session
///
/// Must be created inside a tokio runtime.
pub struct CameraService {
    backend: Arc<dyn CaptureBackend>,
    config: ServiceConfig,
    queue: SessionQueue,
    state: Arc<watch::Sender<ServiceSnapshot>>,
    pending: Arc<PendingCaptures>,
    recording_tx: broadcast::Sender<RecordingEvent>,
    preview: PreviewSlot,
    dispatcher: JoinHandle<()>,
}

impl CameraService {
    pub fn new(backend: Arc<dyn CaptureBackend>, config: ServiceConfig) -> ServiceResult<Self> {
        info!(backend = %backend.kind(), "Creating camera service");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = backend.create_session(events_tx)?;

        let (state, _) = watch::channel(ServiceSnapshot {
            capture_mode: config.default_capture_mode,
            authorization: backend.authorization_status(),
            ..Default::default()
        });
        let state = Arc::new(state);

        let core = SessionCore::new(session, config.mirror_front_camera, Arc::clone(&state));
        let queue = SessionQueue::spawn(core).map_err(|e| {
            error!(error = %e, "Failed to spawn session worker");
            CameraServiceError::Unknown(e.to_string())
        })?;

        let pending = Arc::new(PendingCaptures::new());
        let (recording_tx, _) = broadcast::channel(RECORDING_EVENT_CAPACITY);
        let preview: PreviewSlot = Arc::new(Mutex::new(None));

        let dispatcher = tokio::spawn(
            EventDispatcher {
                state: Arc::clone(&state),
                pending: Arc::clone(&pending),
                recording_tx: recording_tx.clone(),
                preview: Arc::clone(&preview),
                queue: queue.clone(),
                photo_dir: config.photo_dir(),
            }
            .run(events_rx),
        );

        Ok(Self {
            backend,
            config,
            queue,
            state,
            pending,
            recording_tx,
            preview,
            dispatcher,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ===== Observation =====

    /// Receiver for every future state change
    pub fn subscribe(&self) -> watch::Receiver<ServiceSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        self.state.borrow().clone()
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.state.borrow().capture_mode
    }

    /// Flash value for the current capture mode
    pub fn flash_mode(&self) -> FlashMode {
        self.state.borrow().current_flash()
    }

    pub fn is_configured(&self) -> bool {
        self.state.borrow().configured
    }

    pub fn current_device(&self) -> Option<CameraDevice> {
        self.state.borrow().current_device.clone()
    }

    /// Attached outputs, as the session reports them
    pub async fn outputs(&self) -> Vec<crate::backends::OutputKind> {
        self.queue.run(|core| core.outputs()).await.unwrap_or_default()
    }

    // ===== Authorization and devices =====

    /// Resolve camera access, prompting if it was never asked
    pub async fn check_authorization(&self) -> bool {
        let mut status = self.backend.authorization_status();
        if status == AuthorizationStatus::NotDetermined {
            let backend = Arc::clone(&self.backend);
            let granted = tokio::task::spawn_blocking(move || backend.request_access())
                .await
                .unwrap_or(false);
            debug!(granted, "Camera access requested");
            status = self.backend.authorization_status();
        }
        self.state.send_modify(|s| s.authorization = status);
        status.is_authorized()
    }

    /// Enumerate devices again and publish the result
    pub async fn refresh_devices(&self) -> Vec<CameraDevice> {
        let backend = Arc::clone(&self.backend);
        let devices = tokio::task::spawn_blocking(move || discovery::available_devices(&*backend))
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Device enumeration task failed");
                Vec::new()
            });
        self.state.send_modify(|s| s.devices = devices.clone());
        devices
    }

    // ===== Session lifecycle =====

    /// Authorize, enumerate, configure and start
    pub async fn setup(&self) -> ServiceResult<()> {
        if !self.check_authorization().await {
            warn!("Camera access denied");
            return Err(CameraServiceError::PermissionDenied);
        }
        let devices = self.refresh_devices().await;
        let device = discovery::preferred_device(&devices, self.config.preferred_position)
            .ok_or(CameraServiceError::DeviceNotAvailable)?;
        self.configure(device).await?;
        self.start_running().await
    }

    /// Start the session, configuring it first when needed
    pub async fn start_session(&self) -> ServiceResult<()> {
        if !self.is_configured() {
            let device = match self.current_device() {
                Some(device) => device,
                None => {
                    let devices = self.refresh_devices().await;
                    discovery::preferred_device(&devices, self.config.preferred_position)
                        .ok_or(CameraServiceError::DeviceNotAvailable)?
                }
            };
            self.configure(device).await?;
        }
        self.start_running().await
    }

    /// Stop frame flow; no-op when not configured or not running
    pub async fn stop_session(&self) {
        self.queue.run(|core| core.stop()).await;
    }

    /// Stop, detach inputs and outputs, and cancel outstanding photo requests
    ///
    /// The device list survives; the next use needs a full configure.
    pub async fn cleanup_camera(&self) {
        self.queue.run(|core| core.teardown()).await;
        let cancelled = self.pending.fail_all(BackendError::Cancelled);
        if cancelled > 0 {
            info!(cancelled, "Pending photo requests cancelled");
        }
    }

    async fn configure(&self, device: CameraDevice) -> ServiceResult<()> {
        let configured = self
            .queue
            .run(move |core| core.configure(Some(device)))
            .await
            .unwrap_or(false);
        if configured {
            Ok(())
        } else {
            Err(CameraServiceError::ConfigurationFailed)
        }
    }

    async fn start_running(&self) -> ServiceResult<()> {
        let torch = self.torch_target();
        self.queue
            .run(move |core| {
                core.start()?;
                core.set_torch(torch)
            })
            .await
            .ok_or(CameraServiceError::ConfigurationFailed)??;
        Ok(())
    }

    /// Switch to the next camera, preferring the opposite-facing one
    pub async fn switch_camera(&self) -> ServiceResult<()> {
        let mut devices = self.state.borrow().devices.clone();
        if devices.is_empty() {
            devices = self.refresh_devices().await;
        }
        let current = self.current_device();
        let next = discovery::next_device(&devices, current.as_ref())
            .ok_or(CameraServiceError::DeviceNotAvailable)?;
        self.switch_device(next).await
    }

    /// Swap the session input to `device`, keeping outputs and run state
    pub async fn switch_device(&self, device: CameraDevice) -> ServiceResult<()> {
        info!(device = %device.name, "Switching device");
        let torch = self.torch_target();
        self.queue
            .run(move |core| {
                core.switch_device(device)?;
                core.set_torch(torch)
            })
            .await
            .ok_or(CameraServiceError::ConfigurationFailed)??;
        Ok(())
    }

    // ===== Mode and flash =====

    fn torch_target(&self) -> FlashMode {
        let state = self.state.borrow();
        state.flash.torch_for(state.capture_mode)
    }

    async fn apply_torch(&self, torch: FlashMode) {
        match self.queue.run(move |core| core.set_torch(torch)).await {
            Some(Ok(())) | None => {}
            Some(Err(e)) => warn!(error = %e, "Failed to set torch"),
        }
    }

    /// Change capture mode and reconcile the torch
    ///
    /// Photo mode forces the torch off; video mode re-applies the stored
    /// video torch value.
    pub async fn set_capture_mode(&self, mode: CaptureMode) {
        self.state.send_modify(|s| s.capture_mode = mode);
        debug!(%mode, "Capture mode changed");
        self.apply_torch(self.torch_target()).await;
    }

    /// Advance the current mode's flash value
    ///
    /// In video mode the torch has been updated when this returns. In photo
    /// mode only the stored value changes; it rides on the next photo request.
    pub async fn toggle_flash(&self) -> FlashMode {
        let mut mode = CaptureMode::Photo;
        let mut next = FlashMode::Off;
        self.state.send_modify(|s| {
            mode = s.capture_mode;
            next = s.flash.toggle(mode);
        });
        debug!(%mode, flash = %next, "Flash toggled");
        if mode == CaptureMode::Video {
            self.apply_torch(next).await;
        }
        next
    }

    // ===== Capture =====

    fn check_ready(&self) -> ServiceResult<()> {
        let state = self.state.borrow();
        if !state.authorization.is_authorized() {
            return Err(CameraServiceError::PermissionDenied);
        }
        if state.current_device.is_none() {
            return Err(CameraServiceError::DeviceNotAvailable);
        }
        if !state.configured || !state.is_running() {
            return Err(CameraServiceError::ConfigurationFailed);
        }
        Ok(())
    }

    async fn request_photo(&self) -> Result<PathBuf, BackendError> {
        let flash = self.state.borrow().flash.photo;
        let prefer_hevc = self.config.prefer_hevc;
        let (id, rx) = self.pending.register();

        let issued = self
            .queue
            .run(move |core| core.capture_photo(id, flash, prefer_hevc))
            .await
            .unwrap_or(Err(BackendError::Cancelled));
        if let Err(e) = issued {
            debug!(request = id, error = %e, "Photo request rejected");
            self.pending.discard(id);
            return Err(e);
        }

        // No timeout: the request resolves on completion, failure or teardown
        rx.await.unwrap_or(Err(BackendError::Cancelled))
    }

    /// Take a photo; `None` if the session could not produce one
    pub async fn capture_photo(&self) -> Option<PathBuf> {
        match self.request_photo().await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Photo capture failed");
                None
            }
        }
    }

    /// Take a photo after checking authorization, device and session state
    pub async fn take_photo(&self) -> ServiceResult<PathBuf> {
        self.check_ready()?;
        let path = self.request_photo().await?;
        info!(path = %path.display(), "Photo saved");
        Ok(path)
    }

    /// Take a photo in the background and hand the result to `completion`
    pub fn capture_photo_with_completion<F>(self: &Arc<Self>, completion: F)
    where
        F: FnOnce(ServiceResult<PathBuf>) + Send + 'static,
    {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            completion(service.take_photo().await);
        });
    }

    /// Begin recording without waiting; progress arrives on [`Self::recording_events`]
    pub fn start_video_recording(&self) {
        let dir = self.config.video_dir();
        self.queue.dispatch(move |core| {
            if let Err(e) = core.start_recording(&dir) {
                warn!(error = %e, "Recording not started");
            }
        });
    }

    /// Ask the session to finalize the current recording
    pub fn stop_video_recording(&self) {
        self.queue.dispatch(|core| {
            if let Err(e) = core.stop_recording() {
                debug!(error = %e, "Stop recording ignored");
            }
        });
    }

    /// Begin recording after checking preconditions
    pub async fn start_recording(&self) -> ServiceResult<PathBuf> {
        self.check_ready()?;
        if self.state.borrow().is_recording {
            return Err(CameraServiceError::RecordingFailed);
        }
        let dir = self.config.video_dir();
        let path = self
            .queue
            .run(move |core| core.start_recording(&dir))
            .await
            .ok_or(CameraServiceError::RecordingFailed)??;
        Ok(path)
    }

    /// Stop recording and wait for the file to be finalized
    pub async fn finish_recording(&self) -> ServiceResult<PathBuf> {
        let mut events = self.recording_tx.subscribe();
        self.queue
            .run(|core| core.stop_recording())
            .await
            .ok_or(CameraServiceError::RecordingFailed)??;

        loop {
            match events.recv().await {
                Ok(RecordingEvent::Finished { path, result }) => {
                    return match result {
                        Ok(()) => {
                            info!(path = %path.display(), "Recording saved");
                            Ok(path)
                        }
                        Err(e) => {
                            error!(error = %e, "Recording failed");
                            Err(CameraServiceError::RecordingFailed)
                        }
                    };
                }
                Ok(RecordingEvent::Started(_)) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Recording events lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(CameraServiceError::Unknown(
                        "Recording event channel closed".to_string(),
                    ));
                }
            }
        }
    }

    // ===== Streams =====

    /// Live preview frames
    ///
    /// There is a single consumer: returns `None` while another stream is
    /// alive. Frames are forwarded only while a stream is held.
    pub fn preview_frames(&self) -> Option<impl Stream<Item = CameraFrame> + use<>> {
        let mut slot = self.preview.lock().ok()?;
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return None;
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Some(async_stream::stream! {
            while let Some(frame) = rx.recv().await {
                yield frame;
            }
        })
    }

    /// Recording start/finish notifications
    pub fn recording_events(&self) -> impl Stream<Item = RecordingEvent> + use<> {
        let mut rx = self.recording_tx.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

impl Drop for CameraService {
    fn drop(&mut self) {
        self.dispatcher.abort();
        self.pending.fail_all(BackendError::Cancelled);
    }
}

/// Routes session events to the pending table, streams and state
struct EventDispatcher {
    state: Arc<watch::Sender<ServiceSnapshot>>,
    pending: Arc<PendingCaptures>,
    recording_tx: broadcast::Sender<RecordingEvent>,
    preview: PreviewSlot,
    queue: SessionQueue,
    photo_dir: PathBuf,
}

impl EventDispatcher {
    async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::PhotoCaptured { request_id, result } => {
                    let outcome = match result {
                        Ok(photo) => storage::write_photo(&self.photo_dir, photo.codec, &photo.data)
                            .await
                            .map_err(BackendError::from),
                        Err(e) => Err(e),
                    };
                    self.pending.resolve(request_id, outcome);
                }
                SessionEvent::RecordingStarted { path } => {
                    info!(path = %path.display(), "Recording started");
                    self.state.send_modify(|s| s.is_recording = true);
                    let _ = self.recording_tx.send(RecordingEvent::Started(path));
                }
                SessionEvent::RecordingFinished { path, result } => {
                    self.state.send_modify(|s| s.is_recording = false);
                    let _ = self
                        .recording_tx
                        .send(RecordingEvent::Finished { path, result });
                }
                SessionEvent::Frame(frame) => self.forward_frame(frame),
                SessionEvent::RuntimeError(RuntimeError::MediaServicesReset) => {
                    warn!("Media services were reset");
                    self.queue.dispatch(|core| core.recover_after_reset());
                }
                SessionEvent::RuntimeError(RuntimeError::Other(message)) => {
                    error!(error = %message, "Capture session runtime error");
                    self.queue.dispatch(|core| core.sync_phase());
                }
            }
        }
        debug!("Session event channel closed");
    }

    fn forward_frame(&self, frame: CameraFrame) {
        let Ok(mut slot) = self.preview.lock() else {
            return;
        };
        if let Some(tx) = slot.as_ref()
            && tx.send(frame).is_err()
        {
            debug!("Preview consumer dropped");
            *slot = None;
        }
    }
}
