//! Capture session management
//!
//! This module provides the `CaptureSession` abstraction that manages:
//! - The capture graph (camera/microphone inputs, preview/file outputs)
//! - Begin/commit configuration transactions
//! - Quality preset negotiation with fallback
//! - Starting and stopping the data flow

mod config;
mod preset;
mod preview;
mod session;
mod stats;

pub use config::SessionConfig;
pub use preset::{negotiate_quality, SessionPreset};
pub use preview::PreviewSink;
pub use session::{CaptureGraph, CaptureSession, OutputKind, PresetOutcome};
pub use stats::SessionSnapshot;
