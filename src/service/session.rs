// SPDX-License-Identifier: GPL-3.0-only

//! Session worker
//!
//! The capture session is owned by one dedicated thread. Every mutation
//! (configure, device switch, start/stop, capture requests) is a [`Job`]
//! sent through [`SessionQueue`] and executed in FIFO order, so the session
//! is never touched from two places at once.

use super::state::{ServiceSnapshot, SessionPhase};
use crate::backends::{CameraDevice, CaptureSession, OutputKind, PhotoCodec, PhotoRequest};
use crate::constants::SESSION_THREAD_NAME;
use crate::errors::{BackendError, BackendResult};
use crate::flash::FlashMode;
use crate::storage;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

pub type Job = Box<dyn FnOnce(&mut SessionCore) + Send>;

/// Handle to the session worker thread
///
/// Cloning the handle shares the same worker. The worker exits, tearing the
/// session down, once every handle is dropped.
#[derive(Clone)]
pub struct SessionQueue {
    tx: mpsc::Sender<Job>,
}

impl SessionQueue {
    /// Move `core` onto a new worker thread
    pub fn spawn(core: SessionCore) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        std::thread::Builder::new()
            .name(SESSION_THREAD_NAME.to_string())
            .spawn(move || {
                let mut core = core;
                while let Ok(job) = rx.recv() {
                    job(&mut core);
                }
                core.teardown();
                debug!("Session worker exited");
            })?;
        Ok(Self { tx })
    }

    /// Queue `job` without waiting for it
    pub fn dispatch(&self, job: impl FnOnce(&mut SessionCore) + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }

    /// Queue `job` and wait for its result
    ///
    /// Returns `None` if the worker is gone.
    pub async fn run<R>(&self, job: impl FnOnce(&mut SessionCore) -> R + Send + 'static) -> Option<R>
    where
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if !self.dispatch(move |core| {
            let _ = tx.send(job(core));
        }) {
            return None;
        }
        rx.await.ok()
    }
}

/// Begin/commit bracket around session changes
///
/// Commits when dropped, so every exit path (including early returns on a
/// failed precondition) releases the bracket.
struct ConfigurationTransaction<'a> {
    session: &'a mut dyn CaptureSession,
}

impl<'a> ConfigurationTransaction<'a> {
    fn begin(session: &'a mut dyn CaptureSession) -> Self {
        session.begin_configuration();
        Self { session }
    }
}

impl<'a> Deref for ConfigurationTransaction<'a> {
    type Target = dyn CaptureSession + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.session
    }
}

impl DerefMut for ConfigurationTransaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.session
    }
}

impl Drop for ConfigurationTransaction<'_> {
    fn drop(&mut self) {
        self.session.commit_configuration();
    }
}

/// Session plus the bookkeeping the worker needs
pub struct SessionCore {
    session: Box<dyn CaptureSession>,
    configured: bool,
    /// Whether the session should be running (survives runtime resets)
    wants_running: bool,
    mirror_front: bool,
    state: Arc<watch::Sender<ServiceSnapshot>>,
}

impl SessionCore {
    pub fn new(
        session: Box<dyn CaptureSession>,
        mirror_front: bool,
        state: Arc<watch::Sender<ServiceSnapshot>>,
    ) -> Self {
        Self {
            session,
            configured: false,
            wants_running: false,
            mirror_front,
            state,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn outputs(&self) -> Vec<OutputKind> {
        self.session.outputs()
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.state.send_modify(|s| s.phase = phase);
    }

    fn mirror_for(&self, device: &CameraDevice) -> bool {
        self.mirror_front && device.is_front_facing()
    }

    /// Attach `device` and the full output set
    ///
    /// Every precondition is checked before anything is added. The bracket is
    /// committed whether or not configuration succeeds.
    pub fn configure(&mut self, device: Option<CameraDevice>) -> bool {
        let Some(device) = device else {
            warn!("No camera available to configure");
            return false;
        };

        info!(device = %device.name, "Configuring session");
        self.set_phase(SessionPhase::Configuring);

        let mirrored = self.mirror_for(&device);
        let ok = {
            let mut tx = ConfigurationTransaction::begin(self.session.as_mut());
            apply_configuration(&mut *tx, &device, mirrored)
        };

        let phase = if self.session.is_running() {
            SessionPhase::Running
        } else {
            SessionPhase::Stopped
        };

        if ok {
            self.configured = true;
            self.state.send_modify(|s| {
                s.configured = true;
                s.current_device = Some(device);
                s.phase = phase;
            });
            info!("Session configured");
        } else {
            self.state.send_modify(|s| s.phase = phase);
        }
        ok
    }

    /// Replace the input, keeping outputs and run state
    pub fn switch_device(&mut self, device: CameraDevice) -> BackendResult<()> {
        if !self.configured {
            return Err(BackendError::NotConfigured);
        }
        if self.session.input().map(|d| d.id == device.id).unwrap_or(false) {
            return Ok(());
        }
        // The recorder's frame size is fixed by the current input
        if self.session.is_recording() {
            warn!(device = %device.name, "Device switch refused while recording");
            return Err(BackendError::RecordingInProgress);
        }

        let mirrored = self.mirror_for(&device);
        {
            let mut tx = ConfigurationTransaction::begin(self.session.as_mut());
            let previous = tx.input().cloned();
            tx.remove_input();

            if let Err(e) = attach_input(&mut *tx, &device) {
                warn!(device = %device.name, error = %e, "Cannot switch to device, restoring previous input");
                restore_input(&mut *tx, previous);
                return Err(e);
            }
            tx.set_mirrored(mirrored);
        }

        info!(device = %device.name, "Switched device");
        self.state.send_modify(|s| s.current_device = Some(device));

        if self.wants_running
            && !self.session.is_running()
            && let Err(e) = self.session.start_running()
        {
            error!(error = %e, "Session did not restart on the new device");
            self.sync_phase();
            return Err(e);
        }
        Ok(())
    }

    pub fn start(&mut self) -> BackendResult<()> {
        if !self.configured {
            return Err(BackendError::NotConfigured);
        }
        self.wants_running = true;
        if !self.session.is_running() {
            self.session.start_running()?;
        }
        self.set_phase(SessionPhase::Running);
        Ok(())
    }

    /// Stop frame flow; no-op unless configured and running
    pub fn stop(&mut self) {
        self.wants_running = false;
        if !self.configured || !self.session.is_running() {
            debug!("Stop ignored, session not running");
            return;
        }
        self.session.stop_running();
        self.set_phase(SessionPhase::Stopped);
    }

    /// Stop and detach everything; a full configure is needed afterwards
    pub fn teardown(&mut self) {
        self.wants_running = false;
        if self.session.is_recording() {
            self.session.stop_recording();
        }
        if self.session.is_running() {
            self.session.stop_running();
        }
        if let Err(e) = self.session.set_torch(FlashMode::Off) {
            debug!(error = %e, "Torch off failed during teardown");
        }
        {
            let mut tx = ConfigurationTransaction::begin(self.session.as_mut());
            tx.remove_input();
            for output in tx.outputs() {
                tx.remove_output(output);
            }
        }

        let was_configured = std::mem::replace(&mut self.configured, false);
        self.state.send_modify(|s| {
            s.configured = false;
            s.is_recording = false;
            s.torch = FlashMode::Off;
            if s.phase != SessionPhase::Uninitialized {
                s.phase = SessionPhase::Stopped;
            }
        });
        if was_configured {
            info!("Session torn down");
        }
    }

    pub fn set_torch(&mut self, mode: FlashMode) -> BackendResult<()> {
        if !self.configured {
            return Ok(());
        }
        self.session.set_torch(mode)?;
        let has_torch = self.session.input().is_some_and(|d| d.has_torch);
        let effective = if has_torch { mode } else { FlashMode::Off };
        self.state.send_modify(|s| s.torch = effective);
        Ok(())
    }

    /// Issue photo request `id`; the result arrives as a session event
    pub fn capture_photo(&mut self, id: u64, flash: FlashMode, prefer_hevc: bool) -> BackendResult<()> {
        if !self.configured {
            return Err(BackendError::NotConfigured);
        }
        if !self.session.is_running() {
            return Err(BackendError::NotRunning);
        }

        let has_flash = self.session.input().map(|d| d.has_flash).unwrap_or(false);
        let request = PhotoRequest {
            id,
            flash: if has_flash { flash } else { FlashMode::Off },
            codec: PhotoCodec::select(&self.session.supported_photo_codecs(), prefer_hevc),
        };
        debug!(request = id, flash = %request.flash, codec = ?request.codec, "Requesting photo");
        self.session.capture_photo(request)
    }

    /// Begin recording into `dir`, returning the file path
    pub fn start_recording(&mut self, dir: &Path) -> BackendResult<PathBuf> {
        if !self.configured {
            return Err(BackendError::NotConfigured);
        }
        if !self.session.is_running() {
            return Err(BackendError::NotRunning);
        }
        if self.session.is_recording() {
            return Err(BackendError::RecordingInProgress);
        }

        std::fs::create_dir_all(dir)?;
        let path = storage::video_output_path(dir, self.session.recording_extension());
        self.session.start_recording(&path)?;
        self.state.send_modify(|s| s.is_recording = true);
        info!(path = %path.display(), "Recording requested");
        Ok(path)
    }

    pub fn stop_recording(&mut self) -> BackendResult<()> {
        if !self.session.is_recording() {
            return Err(BackendError::NoRecordingInProgress);
        }
        self.session.stop_recording();
        Ok(())
    }

    /// Restart after the platform reset the media stack underneath us
    pub fn recover_after_reset(&mut self) {
        if !self.configured || !self.wants_running {
            debug!("Reset while idle, nothing to restart");
            self.sync_phase();
            return;
        }
        info!("Restarting session after media services reset");
        match self.session.start_running() {
            Ok(()) => self.set_phase(SessionPhase::Running),
            Err(e) => {
                error!(error = %e, "Session restart failed");
                self.set_phase(SessionPhase::Stopped);
            }
        }
    }

    /// Align the published phase with the session after an unexpected error
    pub fn sync_phase(&mut self) {
        if !self.configured {
            return;
        }
        let phase = if self.session.is_running() {
            SessionPhase::Running
        } else {
            SessionPhase::Stopped
        };
        self.set_phase(phase);
    }
}

fn apply_configuration(
    session: &mut dyn CaptureSession,
    device: &CameraDevice,
    mirrored: bool,
) -> bool {
    let attached = session.outputs();
    let missing: Vec<OutputKind> = OutputKind::ALL
        .into_iter()
        .filter(|output| !attached.contains(output))
        .collect();

    if let Some(output) = missing.iter().find(|output| !session.can_add_output(**output)) {
        warn!(%output, "Cannot add output");
        return false;
    }

    let swap_input = session.input().map(|d| d.id != device.id).unwrap_or(true);
    if swap_input {
        if session.is_recording() {
            warn!(device = %device.name, "Input change refused while recording");
            return false;
        }
        let previous = session.input().cloned();
        session.remove_input();
        if let Err(e) = attach_input(session, device) {
            warn!(device = %device.name, error = %e, "Cannot add input");
            restore_input(session, previous);
            return false;
        }
    }

    for output in missing {
        if let Err(e) = session.add_output(output) {
            error!(error = %e, %output, "Failed to add output after precondition passed");
            return false;
        }
    }

    session.set_mirrored(mirrored);
    true
}

fn attach_input(session: &mut dyn CaptureSession, device: &CameraDevice) -> BackendResult<()> {
    if !session.can_add_input(device) {
        return Err(BackendError::ConfigurationFailed(format!(
            "Cannot use {}",
            device.name
        )));
    }
    session.add_input(device)
}

/// Put back the input that was detached before a failed change
fn restore_input(session: &mut dyn CaptureSession, previous: Option<CameraDevice>) {
    let Some(previous) = previous else {
        return;
    };
    if let Err(e) = session.add_input(&previous) {
        error!(device = %previous.name, error = %e, "Failed to restore previous input");
    }
}
