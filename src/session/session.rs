use super::preset::{negotiate_quality, SessionPreset};
use super::preview::PreviewSink;
use super::stats::SessionSnapshot;
use crate::capture::{CaptureBackend, DeviceDescriptor, DeviceKind, MediaSample, StreamRequest};
use crate::error::{CaptureError, CaptureResult};
use crate::recording::{FileConnection, FileOutput, MovieSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Sink kinds a session can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Continuous live-preview rendering target
    Preview,
    /// Movie file target driven by the recording controller
    FileRecording,
}

/// Result of a quality request inside a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetOutcome {
    Applied,
    Unsupported,
}

/// Inputs, outputs and quality of one session
#[derive(Debug, Clone, Default)]
pub struct CaptureGraph {
    pub inputs: Vec<DeviceDescriptor>,
    pub outputs: Vec<OutputKind>,
    pub preset: SessionPreset,
}

impl CaptureGraph {
    pub fn camera(&self) -> Option<&DeviceDescriptor> {
        self.inputs.iter().find(|d| d.kind == DeviceKind::Camera)
    }

    pub fn microphone(&self) -> Option<&DeviceDescriptor> {
        self.inputs.iter().find(|d| d.kind == DeviceKind::Microphone)
    }

    pub fn has_output(&self, kind: OutputKind) -> bool {
        self.outputs.contains(&kind)
    }

    fn stream_request(&self) -> Option<StreamRequest> {
        self.camera().map(|camera| StreamRequest {
            camera: camera.clone(),
            microphone: self.microphone().cloned(),
            preset: self.preset,
        })
    }
}

/// A capture session owning one capture graph and its data flow
///
/// Graph changes are only accepted between `begin_configuration` and
/// `commit_configuration`, and only become visible on commit. The data flow
/// can only be started or stopped while no transaction is open.
pub struct CaptureSession {
    /// Session identifier for log correlation
    id: Uuid,

    backend: Arc<dyn CaptureBackend>,

    /// Graph the data flow runs with
    committed: CaptureGraph,

    /// Buffered changes of the open transaction
    pending: Option<CaptureGraph>,

    /// Whether data is flowing
    running: bool,

    started_at: Option<DateTime<Utc>>,

    preview: PreviewSink,

    file_output: Arc<FileOutput>,

    /// Handle for the sample routing task
    router: Option<JoinHandle<()>>,

    samples_routed: Arc<AtomicU64>,
}

impl CaptureSession {
    /// Create an empty session on `backend`, recording through `sink`
    pub fn new(backend: Arc<dyn CaptureBackend>, sink: Arc<dyn MovieSink>) -> Self {
        let id = Uuid::new_v4();
        info!("Creating capture session {} on {}", id, backend.name());

        Self {
            id,
            backend,
            committed: CaptureGraph::default(),
            pending: None,
            running: false,
            started_at: None,
            preview: PreviewSink::new(),
            file_output: Arc::new(FileOutput::new(sink)),
            router: None,
            samples_routed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open a configuration transaction
    pub fn begin_configuration(&mut self) -> CaptureResult<()> {
        if self.pending.is_some() {
            warn!("Session {}: nested configuration rejected", self.id);
            return Err(CaptureError::rejected(
                "a configuration transaction is already open",
            ));
        }

        debug!("Session {}: begin configuration", self.id);
        self.pending = Some(self.committed.clone());
        Ok(())
    }

    /// Discard the open transaction without applying it
    pub fn cancel_configuration(&mut self) {
        if self.pending.take().is_some() {
            info!("Session {}: configuration discarded", self.id);
        }
    }

    /// Wire `device` as an input
    pub fn add_input(&mut self, device: DeviceDescriptor) -> CaptureResult<()> {
        let present = self.backend.devices().iter().any(|d| d.id == device.id);
        let graph = self.pending_mut("add an input")?;

        if !present {
            warn!("Input {} is no longer connected", device.name);
            return Err(CaptureError::DeviceUnavailable(device.kind));
        }
        if !device.can_open() {
            return Err(CaptureError::rejected(format!(
                "{} cannot be opened",
                device.name
            )));
        }
        if graph.inputs.iter().any(|d| d.id == device.id) {
            return Err(CaptureError::rejected(format!(
                "{} is already an input",
                device.name
            )));
        }
        if graph.inputs.iter().any(|d| d.kind == device.kind) {
            return Err(CaptureError::rejected(format!(
                "session already has a {} input",
                device.kind
            )));
        }

        info!("Adding {} input: {}", device.kind, device.name);
        graph.inputs.push(device);
        Ok(())
    }

    /// Attach an output sink
    pub fn add_output(&mut self, kind: OutputKind) -> CaptureResult<()> {
        let graph = self.pending_mut("add an output")?;

        if graph.inputs.is_empty() {
            return Err(CaptureError::rejected(format!(
                "cannot add {:?} output before any input",
                kind
            )));
        }
        if graph.has_output(kind) {
            return Err(CaptureError::rejected(format!(
                "session already has a {:?} output",
                kind
            )));
        }

        info!("Adding {:?} output", kind);
        graph.outputs.push(kind);
        Ok(())
    }

    /// Ask for `preset`; applied only if every wired input supports it
    pub fn try_set_quality(&mut self, preset: SessionPreset) -> CaptureResult<PresetOutcome> {
        let backend = Arc::clone(&self.backend);
        let graph = self.pending_mut("set the quality preset")?;

        if !preset_supported(backend.as_ref(), graph, preset) {
            debug!("Preset {:?} unsupported by current inputs", preset);
            return Ok(PresetOutcome::Unsupported);
        }

        info!("Session preset set to {:?}", preset);
        graph.preset = preset;
        Ok(PresetOutcome::Applied)
    }

    /// Apply the first supported tier of `desired`, falling back to `Default`
    pub fn negotiate_quality(&mut self, desired: &[SessionPreset]) -> CaptureResult<SessionPreset> {
        let backend = Arc::clone(&self.backend);
        let graph = self.pending_mut("negotiate quality")?;

        let preset = negotiate_quality(desired, |p| {
            preset_supported(backend.as_ref(), &*graph, p)
        });
        if preset == SessionPreset::Default && !desired.contains(&SessionPreset::Default) {
            warn!(
                "None of {:?} supported, using the session default preset",
                desired
            );
        }

        graph.preset = preset;
        info!("Negotiated session preset: {:?}", preset);
        Ok(preset)
    }

    /// Apply the open transaction atomically
    ///
    /// A running session restarts its data flow with the new graph. Changes
    /// are rejected while a recording is in flight; the transaction is closed
    /// either way.
    pub async fn commit_configuration(&mut self) -> CaptureResult<()> {
        let Some(mut graph) = self.pending.take() else {
            return Err(CaptureError::rejected(
                "commit without an open configuration transaction",
            ));
        };

        if graph.inputs.iter().filter(|d| d.is_camera()).count() > 1 {
            return Err(CaptureError::Inconsistent(
                "more than one camera input".to_string(),
            ));
        }

        if !preset_supported(self.backend.as_ref(), &graph, graph.preset) {
            warn!(
                "Preset {:?} no longer supported by the inputs, using default",
                graph.preset
            );
            graph.preset = SessionPreset::Default;
        }

        let changed = graph.inputs != self.committed.inputs
            || graph.outputs != self.committed.outputs
            || graph.preset != self.committed.preset;

        // The writer keeps the track layout it was opened with
        if changed && self.file_output.is_recording() {
            warn!("Session {}: configuration change rejected while recording", self.id);
            return Err(CaptureError::rejected(
                "cannot change the capture graph while a recording is in flight",
            ));
        }

        let file_recording = graph.has_output(OutputKind::FileRecording);
        let connection = match (file_recording, graph.stream_request()) {
            (false, _) => FileConnection::Disconnected,
            (true, None) => FileConnection::NoCamera,
            (true, Some(request)) => FileConnection::Ready(self.backend.stream_format(&request)),
        };

        let restart = self.running && changed;

        if restart {
            self.stop_flow().await?;
        }

        self.committed = graph;
        self.file_output.connect(connection);
        info!(
            "Session {}: committed {} inputs, {:?} outputs, preset {:?}",
            self.id,
            self.committed.inputs.len(),
            self.committed.outputs,
            self.committed.preset
        );

        if restart {
            self.start_flow().await?;
        }

        Ok(())
    }

    /// Start the data flow; no-op when already running
    pub async fn start(&mut self) -> CaptureResult<()> {
        if self.pending.is_some() {
            return Err(CaptureError::rejected(
                "cannot start while a configuration transaction is open",
            ));
        }
        if self.running {
            debug!("Session {} already running", self.id);
            return Ok(());
        }

        self.start_flow().await
    }

    /// Stop the data flow; no-op when already stopped
    ///
    /// A recording in flight is ended and still finalizes.
    pub async fn stop(&mut self) -> CaptureResult<()> {
        if self.pending.is_some() {
            return Err(CaptureError::rejected(
                "cannot stop while a configuration transaction is open",
            ));
        }
        if !self.running {
            debug!("Session {} already stopped", self.id);
            return Ok(());
        }

        if self.file_output.interrupt() {
            info!("Session {} stopping with a recording in flight", self.id);
        }

        self.stop_flow().await
    }

    /// Stop the data flow and drop the graph
    pub async fn teardown(mut self) -> CaptureResult<()> {
        self.cancel_configuration();
        self.stop().await?;
        self.file_output.connect(FileConnection::Disconnected);
        info!("Session {} torn down", self.id);
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_configuring(&self) -> bool {
        self.pending.is_some()
    }

    pub fn preset(&self) -> SessionPreset {
        self.committed.preset
    }

    /// The committed graph
    pub fn graph(&self) -> &CaptureGraph {
        &self.committed
    }

    pub fn preview(&self) -> &PreviewSink {
        &self.preview
    }

    /// The file-recording sink the recording controller drives
    pub fn file_output(&self) -> Arc<FileOutput> {
        Arc::clone(&self.file_output)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.to_string(),
            running: self.running,
            configuring: self.pending.is_some(),
            preset: self.committed.preset,
            inputs: self.committed.inputs.iter().map(|d| d.name.clone()).collect(),
            outputs: self.committed.outputs.clone(),
            started_at: self.started_at,
            samples_routed: self.samples_routed.load(Ordering::SeqCst),
        }
    }

    fn pending_mut(&mut self, action: &str) -> CaptureResult<&mut CaptureGraph> {
        self.pending.as_mut().ok_or_else(|| {
            CaptureError::rejected(format!(
                "cannot {} outside a configuration transaction",
                action
            ))
        })
    }

    async fn start_flow(&mut self) -> CaptureResult<()> {
        let Some(request) = self.committed.stream_request() else {
            return Err(if self.committed.inputs.is_empty() {
                CaptureError::rejected("session has no inputs")
            } else {
                CaptureError::DeviceUnavailable(DeviceKind::Camera)
            });
        };

        info!("Starting capture session {}", self.id);

        let rx = self
            .backend
            .start(&request)
            .await
            .map_err(CaptureError::Backend)?;

        let preview = self
            .committed
            .has_output(OutputKind::Preview)
            .then(|| self.preview.clone());
        let file_output = self
            .committed
            .has_output(OutputKind::FileRecording)
            .then(|| Arc::clone(&self.file_output));

        self.router = Some(tokio::spawn(route_samples(
            rx,
            preview,
            file_output,
            Arc::clone(&self.samples_routed),
        )));
        self.running = true;
        self.started_at = Some(Utc::now());

        info!("Capture session {} running", self.id);
        Ok(())
    }

    async fn stop_flow(&mut self) -> CaptureResult<()> {
        info!("Stopping capture session {}", self.id);

        let result = self.backend.stop().await.map_err(CaptureError::Backend);

        // Wait for routing to drain
        if let Some(router) = self.router.take() {
            if let Err(e) = router.await {
                error!("Routing task panicked: {}", e);
            }
        }

        self.running = false;
        self.preview.clear();
        result
    }
}

fn preset_supported(
    backend: &dyn CaptureBackend,
    graph: &CaptureGraph,
    preset: SessionPreset,
) -> bool {
    if preset == SessionPreset::Default {
        return true;
    }
    graph.camera().is_some() && graph.inputs.iter().all(|d| backend.supports_preset(d, preset))
}

async fn route_samples(
    mut rx: mpsc::Receiver<MediaSample>,
    preview: Option<PreviewSink>,
    file_output: Option<Arc<FileOutput>>,
    routed: Arc<AtomicU64>,
) {
    debug!("Sample routing task started");

    while let Some(sample) = rx.recv().await {
        if let (Some(preview), MediaSample::Video(frame)) = (&preview, &sample) {
            preview.publish(Arc::clone(frame));
        }

        if let Some(output) = &file_output {
            output.route(&sample);
        }

        routed.fetch_add(1, Ordering::SeqCst);
    }

    debug!("Sample routing task stopped");
}
