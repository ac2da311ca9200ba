pub mod capture;
pub mod config;
pub mod error;
pub mod permission;
pub mod playback;
pub mod recording;
pub mod screen;
pub mod session;

pub use capture::{
    CaptureBackend, DeviceDescriptor, DeviceKind, DeviceSelector, Facing, LensClass, MediaSample,
    VirtualBackend, VirtualDevice,
};
pub use config::Config;
pub use error::{CaptureError, CaptureResult};
pub use permission::{await_permission, PermissionProvider, PermissionStatus, StaticPermissions};
pub use playback::{GesturePhase, HostView, OverlayFrame, PlaybackTrigger};
pub use recording::{
    ArtifactStore, FfmpegSink, FileOutput, MovieSink, RecorderEvent, RecordingArtifact,
    RecordingController, RecordingState,
};
pub use screen::{CameraScreen, ScreenConfig, ScreenDeps};
pub use session::{CaptureSession, OutputKind, PresetOutcome, SessionConfig, SessionPreset};
