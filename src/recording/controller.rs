use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::output::FileOutput;
use super::storage::{ArtifactStore, RecordingArtifact};
use crate::error::{CaptureError, CaptureResult};

/// Recording state owned by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Idle,
    Recording,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Asynchronous notifications from the file-recording sink
///
/// Emitted from writer tasks; consumers on the UI side receive them through
/// the channel returned by `RecordingController::new`.
#[derive(Debug)]
pub enum RecorderEvent {
    /// Destination opened, samples are being written
    RecordingStarted(RecordingArtifact),
    /// File flushed and closed, or failed with `error`
    RecordingFinished {
        artifact: RecordingArtifact,
        error: Option<CaptureError>,
    },
}

/// Toggle-to-record state machine over a session's file output
pub struct RecordingController {
    output: Arc<FileOutput>,
    store: ArtifactStore,
    state: RecordingState,
    events: mpsc::UnboundedSender<RecorderEvent>,
    /// Writer tasks that have not emitted `RecordingFinished` yet
    in_flight: Vec<JoinHandle<()>>,
}

impl RecordingController {
    /// Create a controller and the receiver its events are delivered on
    pub fn new(
        output: Arc<FileOutput>,
        store: ArtifactStore,
    ) -> (Self, mpsc::UnboundedReceiver<RecorderEvent>) {
        let (events, rx) = mpsc::unbounded_channel();

        let controller = Self {
            output,
            store,
            state: RecordingState::Idle,
            events,
            in_flight: Vec::new(),
        };

        (controller, rx)
    }

    /// Current state
    ///
    /// A recording ended by the session stopping counts as idle.
    pub fn state(&self) -> RecordingState {
        match self.state {
            RecordingState::Recording if !self.output.is_recording() => RecordingState::Idle,
            state => state,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Start recording to a freshly named artifact
    pub async fn start(&mut self) -> CaptureResult<RecordingArtifact> {
        self.ensure_idle()?;
        let artifact = self.store.new_artifact().await?;
        self.begin(artifact).await
    }

    /// Start recording to `path`; relative paths land in the artifact store
    pub async fn start_to(&mut self, path: impl AsRef<Path>) -> CaptureResult<RecordingArtifact> {
        self.ensure_idle()?;
        let artifact = self.store.artifact_at(path).await?;
        self.begin(artifact).await
    }

    /// Stop recording
    ///
    /// Returns once finalization has been requested. `RecordingFinished`
    /// follows after the file is closed.
    pub fn stop(&mut self) -> CaptureResult<RecordingArtifact> {
        if self.state() == RecordingState::Idle {
            self.state = RecordingState::Idle;
            return Err(CaptureError::InvalidTransition {
                state: RecordingState::Idle,
                action: "stop recording",
            });
        }

        let artifact = self.output.stop_recording().ok_or_else(|| {
            CaptureError::Inconsistent("recording state without an active file".to_string())
        })?;
        self.state = RecordingState::Idle;

        info!("Recording stop requested: {}", artifact.path.display());
        Ok(artifact)
    }

    /// Start when idle, stop when recording; returns the new state
    pub async fn toggle(&mut self) -> CaptureResult<RecordingState> {
        match self.state() {
            RecordingState::Idle => {
                self.start().await?;
            }
            RecordingState::Recording => {
                self.stop()?;
            }
        }
        Ok(self.state)
    }

    /// Stop any recording and wait for every pending finalize
    ///
    /// Events of the finished recordings stay queued on the receiver.
    pub async fn teardown(&mut self) {
        if self.is_recording() {
            if let Err(e) = self.stop() {
                warn!("Failed to stop recording during teardown: {}", e);
            }
        }

        let pending = std::mem::take(&mut self.in_flight);
        if !pending.is_empty() {
            info!("Waiting for {} recording(s) to finalize", pending.len());
        }

        for result in join_all(pending).await {
            if let Err(e) = result {
                error!("Recording writer task panicked: {}", e);
            }
        }
    }

    fn ensure_idle(&mut self) -> CaptureResult<()> {
        if self.state() == RecordingState::Recording {
            warn!("Start rejected, a recording is already in flight");
            return Err(CaptureError::InvalidTransition {
                state: RecordingState::Recording,
                action: "start recording",
            });
        }
        self.state = RecordingState::Idle;
        Ok(())
    }

    async fn begin(&mut self, artifact: RecordingArtifact) -> CaptureResult<RecordingArtifact> {
        self.in_flight.retain(|task| !task.is_finished());

        let task = self
            .output
            .start_recording(artifact.clone(), self.events.clone())
            .await?;

        self.in_flight.push(task);
        self.state = RecordingState::Recording;
        Ok(artifact)
    }
}
