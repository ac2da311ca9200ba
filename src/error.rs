//! Error types for the capture core
//!
//! Device absence, rejected configuration and file I/O are all returned as
//! values. Callers decide what the user sees.

use std::path::PathBuf;
use thiserror::Error;

use crate::capture::DeviceKind;
use crate::permission::PermissionStatus;
use crate::recording::RecordingState;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// No hardware matching the request exists
    #[error("No {0} available")]
    DeviceUnavailable(DeviceKind),

    /// Topology or preset request invalid for the current session state
    #[error("Configuration rejected: {0}")]
    ConfigurationRejected(String),

    /// Artifact could not be opened, written or finalized
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Permission not granted: {0:?}")]
    PermissionDenied(PermissionStatus),

    /// The screen went away before an asynchronous step completed
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Cannot {action} while {state:?}")]
    InvalidTransition {
        state: RecordingState,
        action: &'static str,
    },

    #[error("Capture backend failure: {0:#}")]
    Backend(anyhow::Error),

    /// The session can no longer be trusted; the feature must shut down
    #[error("Capture session is inconsistent: {0}")]
    Inconsistent(String),
}

impl CaptureError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::ConfigurationRejected(reason.into())
    }

    /// Whether the caller may retry or adjust and carry on
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Inconsistent(_))
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
