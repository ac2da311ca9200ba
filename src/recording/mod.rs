//! Recording to movie files
//!
//! - `RecordingController`: idle/recording state machine driven by toggles
//! - `FileOutput`: the session's file-recording sink
//! - `MovieSink`/`MovieWriter`: encoders (`FfmpegSink`)
//! - `ArtifactStore`: timestamp-named artifacts in the recordings directory

mod controller;
mod output;
mod storage;
mod writer;

pub use controller::{RecorderEvent, RecordingController, RecordingState};
pub use output::{FileConnection, FileOutput};
pub use storage::{artifact_stem, ArtifactStore, RecordingArtifact};
pub use writer::{FfmpegSink, MovieSink, MovieWriter};
