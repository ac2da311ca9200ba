//! Camera screen
//!
//! Owns the capture session, the recording controller and the playback
//! trigger of one screen instance. Visibility changes, button presses and
//! taps from the UI layer map onto its methods; recorder events are handed
//! back to the UI side through `next_event`.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::capture::{CaptureBackend, DeviceKind, DeviceSelector};
use crate::error::{CaptureError, CaptureResult};
use crate::permission::{await_permission, PermissionProvider};
use crate::playback::{GesturePhase, HostView, PlaybackTrigger, PlayerFactory};
use crate::recording::{
    ArtifactStore, MovieSink, RecorderEvent, RecordingController, RecordingState,
};
use crate::session::{CaptureSession, OutputKind, SessionConfig};

/// Collaborators a screen is built from
#[derive(Clone)]
pub struct ScreenDeps {
    pub backend: Arc<dyn CaptureBackend>,
    pub sink: Arc<dyn MovieSink>,
    pub players: Arc<dyn PlayerFactory>,
    pub permissions: Arc<dyn PermissionProvider>,
}

/// Per-screen settings
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub session: SessionConfig,
    pub store: ArtifactStore,
    pub host: HostView,
    /// Present every successfully finished recording
    pub autoplay: bool,
}

pub struct CameraScreen {
    session: CaptureSession,
    recorder: RecordingController,
    events: mpsc::UnboundedReceiver<RecorderEvent>,
    playback: PlaybackTrigger,
    audio: bool,
    autoplay: bool,
}

impl CameraScreen {
    /// Ask for permission, then resolve devices and configure the session
    ///
    /// Nothing is set up unless camera access is granted. Dismissing the
    /// screen (`dismissed` becoming true) while waiting cancels with
    /// `Cancelled`.
    pub async fn open(
        deps: ScreenDeps,
        config: ScreenConfig,
        mut dismissed: watch::Receiver<bool>,
    ) -> CaptureResult<Self> {
        await_permission(deps.permissions.as_ref(), DeviceKind::Camera, &mut dismissed).await?;

        let mut include_audio = config.session.include_audio;
        if include_audio {
            match await_permission(
                deps.permissions.as_ref(),
                DeviceKind::Microphone,
                &mut dismissed,
            )
            .await
            {
                Ok(()) => {}
                Err(CaptureError::PermissionDenied(status)) => {
                    warn!("Microphone access {:?}, recording video only", status);
                    include_audio = false;
                }
                Err(e) => return Err(e),
            }
        }

        let mut session = CaptureSession::new(Arc::clone(&deps.backend), Arc::clone(&deps.sink));
        let audio = configure(&mut session, deps.backend.as_ref(), &config.session, include_audio)
            .await?;

        let (recorder, events) = RecordingController::new(session.file_output(), config.store);
        let playback = PlaybackTrigger::new(deps.players, config.host);

        info!(
            "Camera screen ready (session {}, audio: {})",
            session.id(),
            audio
        );

        Ok(Self {
            session,
            recorder,
            events,
            playback,
            audio,
            autoplay: config.autoplay,
        })
    }

    /// Screen became visible
    pub async fn appear(&mut self) -> CaptureResult<()> {
        self.session.start().await
    }

    /// Screen became hidden
    pub async fn disappear(&mut self) -> CaptureResult<()> {
        self.session.stop().await
    }

    /// Record button pressed; returns the new state
    pub async fn toggle_record(&mut self) -> CaptureResult<RecordingState> {
        self.recorder.toggle().await
    }

    /// Drives the record button's selected look
    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    /// Tap on the screen; replays the last artifact when the tap completes
    pub async fn tap(&mut self, phase: GesturePhase) -> CaptureResult<bool> {
        self.playback.on_tap(phase).await
    }

    /// Wait for the next recorder event and apply it to the screen
    ///
    /// Returns `None` once no recorder can emit events anymore.
    pub async fn next_event(&mut self) -> Option<RecorderEvent> {
        let event = self.events.recv().await?;
        self.handle_event(&event).await;
        Some(event)
    }

    /// Wait until the recording in finalization reports back
    pub async fn wait_finished(&mut self) -> Option<RecorderEvent> {
        while let Some(event) = self.next_event().await {
            if matches!(event, RecorderEvent::RecordingFinished { .. }) {
                return Some(event);
            }
        }
        None
    }

    async fn handle_event(&mut self, event: &RecorderEvent) {
        match event {
            RecorderEvent::RecordingStarted(artifact) => {
                info!("Recording to {}", artifact.path.display());
            }
            RecorderEvent::RecordingFinished {
                artifact,
                error: None,
            } => {
                if self.autoplay {
                    if let Err(e) = self.playback.present(artifact.clone()).await {
                        warn!("Could not present {}: {}", artifact.path.display(), e);
                    }
                }
            }
            RecorderEvent::RecordingFinished {
                artifact,
                error: Some(e),
            } => {
                warn!("Recording {} failed: {}", artifact.path.display(), e);
            }
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn playback(&self) -> &PlaybackTrigger {
        &self.playback
    }

    pub fn has_audio(&self) -> bool {
        self.audio
    }

    /// Stop everything, waiting for in-flight recordings to finalize
    pub async fn teardown(mut self) -> CaptureResult<()> {
        self.recorder.teardown().await;

        // Deliver what the finalizers reported
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(&event).await;
        }

        self.playback.dismiss().await;
        self.session.teardown().await
    }
}

/// Wire camera, optional microphone, quality and outputs in one transaction
///
/// Returns whether a microphone input was wired.
async fn configure(
    session: &mut CaptureSession,
    backend: &dyn CaptureBackend,
    config: &SessionConfig,
    include_audio: bool,
) -> CaptureResult<bool> {
    let selector = DeviceSelector::new(backend);
    let camera = selector.resolve_camera(config.facing, &config.preferred_lenses)?;

    session.begin_configuration()?;

    let wired = (|| -> CaptureResult<bool> {
        session.add_input(camera)?;

        let mut audio = false;
        if include_audio {
            match selector.resolve_microphone() {
                Ok(microphone) => match session.add_input(microphone) {
                    Ok(()) => audio = true,
                    Err(e) => warn!("Microphone not wired, recording video only: {}", e),
                },
                Err(e) => warn!("{}, recording video only", e),
            }
        }

        session.negotiate_quality(&config.preferred_presets)?;
        session.add_output(OutputKind::Preview)?;
        session.add_output(OutputKind::FileRecording)?;
        Ok(audio)
    })();

    match wired {
        Ok(audio) => {
            session.commit_configuration().await?;
            Ok(audio)
        }
        Err(e) => {
            session.cancel_configuration();
            Err(e)
        }
    }
}
