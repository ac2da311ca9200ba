use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::controller::RecorderEvent;
use super::storage::RecordingArtifact;
use super::writer::{MovieSink, MovieWriter};
use crate::capture::{DeviceKind, MediaSample, TrackFormat};
use crate::error::{CaptureError, CaptureResult};

/// Samples buffered between the router and a slow writer before frames drop
const WRITE_QUEUE_DEPTH: usize = 120;

/// How the file output is wired into the committed capture graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileConnection {
    /// No file-recording output in the graph
    Disconnected,
    /// File output present but the graph has no camera input
    NoCamera,
    Ready(TrackFormat),
}

struct ActiveRecording {
    artifact: RecordingArtifact,
    tx: mpsc::Sender<MediaSample>,
}

impl ActiveRecording {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// File-recording sink of a capture session
///
/// Each recording gets its own writer task. Stopping only closes the
/// task's queue; the task drains it, finalizes the file and then reports
/// `RecordingFinished`.
pub struct FileOutput {
    sink: Arc<dyn MovieSink>,
    connection: Mutex<FileConnection>,
    active: Mutex<Option<ActiveRecording>>,
}

impl FileOutput {
    pub fn new(sink: Arc<dyn MovieSink>) -> Self {
        Self {
            sink,
            connection: Mutex::new(FileConnection::Disconnected),
            active: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> FileConnection {
        self.connection
            .lock()
            .map(|c| *c)
            .unwrap_or(FileConnection::Disconnected)
    }

    /// Whether a recording is accepting samples
    ///
    /// A writer that gave up after a failed write closes its queue, so its
    /// recording no longer counts.
    pub fn is_recording(&self) -> bool {
        self.active
            .lock()
            .map(|a| a.as_ref().is_some_and(ActiveRecording::is_open))
            .unwrap_or(false)
    }

    /// Artifact currently being written, if any
    pub fn current_artifact(&self) -> Option<RecordingArtifact> {
        self.active.lock().ok().and_then(|a| {
            a.as_ref()
                .filter(|r| r.is_open())
                .map(|r| r.artifact.clone())
        })
    }

    pub(crate) fn connect(&self, connection: FileConnection) {
        if let Ok(mut current) = self.connection.lock() {
            *current = connection;
        }
    }

    /// Open `artifact` and begin accepting samples
    ///
    /// Emits `RecordingStarted` once the destination is open. The returned
    /// handle resolves after `RecordingFinished` has been emitted.
    pub async fn start_recording(
        &self,
        artifact: RecordingArtifact,
        events: mpsc::UnboundedSender<RecorderEvent>,
    ) -> CaptureResult<JoinHandle<()>> {
        let format = match self.connection() {
            FileConnection::Ready(format) => format,
            FileConnection::NoCamera => {
                return Err(CaptureError::DeviceUnavailable(DeviceKind::Camera))
            }
            FileConnection::Disconnected => {
                return Err(CaptureError::rejected(
                    "no file-recording output in the committed session",
                ))
            }
        };

        if self.is_recording() {
            return Err(CaptureError::rejected("file output is already recording"));
        }

        let writer = self
            .sink
            .create(&artifact.path, &format)
            .await
            .map_err(|e| CaptureError::io(&artifact.path, e))?;

        let (tx, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        match self.active.lock() {
            Ok(mut active) => {
                *active = Some(ActiveRecording {
                    artifact: artifact.clone(),
                    tx,
                })
            }
            Err(_) => {
                return Err(CaptureError::Inconsistent(
                    "file output state poisoned".to_string(),
                ))
            }
        }

        info!(
            "Recording started: {} via {}",
            artifact.path.display(),
            self.sink.name()
        );
        let _ = events.send(RecorderEvent::RecordingStarted(artifact.clone()));

        Ok(tokio::spawn(write_samples(artifact, writer, rx, events)))
    }

    /// Close the queue of the recording in flight
    ///
    /// Returns the artifact that will be finalized, or `None` when idle.
    pub fn stop_recording(&self) -> Option<RecordingArtifact> {
        let recording = self
            .active
            .lock()
            .ok()
            .and_then(|mut a| a.take())
            .filter(ActiveRecording::is_open);

        recording.map(|r| {
            info!("Finalizing {}", r.artifact.path.display());
            r.artifact
        })
    }

    /// Stop a recording because the session stopped; true if one was in flight
    pub(crate) fn interrupt(&self) -> bool {
        self.stop_recording().is_some()
    }

    /// Hand a routed sample to the recording in flight
    pub(crate) fn route(&self, sample: &MediaSample) {
        let tx = match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some(recording) => recording.tx.clone(),
                None => return,
            },
            Err(_) => return,
        };

        match tx.try_send(sample.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Writer is behind, dropping sample at {}ms", sample.timestamp_ms())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Writer closed, sample discarded")
            }
        }
    }
}

async fn write_samples(
    artifact: RecordingArtifact,
    mut writer: Box<dyn MovieWriter>,
    mut rx: mpsc::Receiver<MediaSample>,
    events: mpsc::UnboundedSender<RecorderEvent>,
) {
    let mut failure = None;

    while let Some(sample) = rx.recv().await {
        if let Err(e) = writer.write(&sample).await {
            error!("Failed to write {}: {}", artifact.path.display(), e);
            failure = Some(e);
            break;
        }
    }
    drop(rx);

    if let Err(e) = writer.finalize().await {
        error!("Failed to finalize {}: {}", artifact.path.display(), e);
        failure.get_or_insert(e);
    }

    let error = failure.map(|e| CaptureError::io(&artifact.path, e));
    match &error {
        None => info!("Recording finished: {}", artifact.path.display()),
        Some(e) => warn!("Recording finished with error: {}", e),
    }

    let _ = events.send(RecorderEvent::RecordingFinished { artifact, error });
}
