use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::session::SessionPreset;

/// Kind of physical capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Camera,
    Microphone,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Camera => write!(f, "camera"),
            DeviceKind::Microphone => write!(f, "microphone"),
        }
    }
}

/// Camera lens class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensClass {
    UltraWide,
    WideAngle,
}

/// Which side of the device a camera points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Front,
    Back,
}

/// A physical capture device as reported by a backend
///
/// Resolved fresh for every session setup; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Backend-unique device ID
    pub id: String,
    /// Human readable name
    pub name: String,
    pub kind: DeviceKind,
    /// Lens class (cameras only)
    pub lens: Option<LensClass>,
    /// Facing (cameras only)
    pub facing: Option<Facing>,
    /// Whether the device can currently be opened
    pub openable: bool,
    /// Whether the system reports this as its default device of this kind
    pub is_default: bool,
}

impl DeviceDescriptor {
    pub fn can_open(&self) -> bool {
        self.openable
    }

    pub fn is_camera(&self) -> bool {
        self.kind == DeviceKind::Camera
    }
}

/// A single video frame (RGB24, tightly packed)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// Timestamp in milliseconds since the stream started
    pub timestamp_ms: u64,
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the stream started
    pub timestamp_ms: u64,
}

/// One unit of media flowing through the capture graph
#[derive(Debug, Clone)]
pub enum MediaSample {
    Video(Arc<VideoFrame>),
    Audio(Arc<AudioFrame>),
}

impl MediaSample {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            MediaSample::Video(frame) => frame.timestamp_ms,
            MediaSample::Audio(frame) => frame.timestamp_ms,
        }
    }
}

/// Audio track layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Track layout a stream will produce, known before the first sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// None for video-only capture
    pub audio: Option<AudioFormat>,
}

/// The devices and quality a backend is asked to stream
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub camera: DeviceDescriptor,
    pub microphone: Option<DeviceDescriptor>,
    pub preset: SessionPreset,
}

/// Capture hardware backend trait
///
/// Implementations:
/// - `VirtualBackend`: in-process devices producing synthetic frames (headless, tests)
///
/// Hardware backends plug in here. Opening and closing a stream is blocking
/// work on most platforms and should be moved off the caller's task.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Enumerate the devices present right now
    fn devices(&self) -> Vec<DeviceDescriptor>;

    /// Whether `device` can deliver `preset`
    fn supports_preset(&self, device: &DeviceDescriptor, preset: SessionPreset) -> bool;

    /// Track layout `start` would produce for `request`
    fn stream_format(&self, request: &StreamRequest) -> TrackFormat;

    /// Start streaming
    ///
    /// Returns a channel receiver that will receive media samples
    async fn start(&self, request: &StreamRequest) -> Result<mpsc::Receiver<MediaSample>>;

    /// Stop streaming
    async fn stop(&self) -> Result<()>;

    /// Check if backend is currently streaming
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
