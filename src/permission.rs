//! Capture permission protocol
//!
//! Permission is requested once with a single asynchronous answer. Setup
//! only runs after `Granted`; dismissing the screen while the request is
//! pending cancels it.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::capture::DeviceKind;
use crate::error::{CaptureError, CaptureResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    /// The user declined access
    Denied,
    /// Access is blocked by policy (e.g. parental controls)
    Restricted,
}

/// Source of capture permission answers
#[async_trait::async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Ask for access to devices of `kind`; resolves once with the answer
    async fn request_access(&self, kind: DeviceKind) -> PermissionStatus;
}

/// Answers every request with a fixed status
pub struct StaticPermissions {
    status: PermissionStatus,
}

impl StaticPermissions {
    pub fn new(status: PermissionStatus) -> Self {
        Self { status }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted)
    }
}

#[async_trait::async_trait]
impl PermissionProvider for StaticPermissions {
    async fn request_access(&self, _kind: DeviceKind) -> PermissionStatus {
        self.status
    }
}

/// Request access and wait for the answer
///
/// Resolves with `Cancelled` if `dismissed` flips to true (or its sender
/// goes away) before the provider answers.
pub async fn await_permission(
    provider: &dyn PermissionProvider,
    kind: DeviceKind,
    dismissed: &mut watch::Receiver<bool>,
) -> CaptureResult<()> {
    if *dismissed.borrow() {
        return Err(CaptureError::Cancelled);
    }

    let status = tokio::select! {
        status = provider.request_access(kind) => status,
        _ = wait_dismissed(dismissed) => {
            info!("Screen dismissed while waiting for {} permission", kind);
            return Err(CaptureError::Cancelled);
        }
    };

    match status {
        PermissionStatus::Granted => {
            info!("{} permission granted", kind);
            Ok(())
        }
        other => {
            warn!("{} permission not granted: {:?}", kind, other);
            Err(CaptureError::PermissionDenied(other))
        }
    }
}

async fn wait_dismissed(dismissed: &mut watch::Receiver<bool>) {
    loop {
        if *dismissed.borrow_and_update() {
            return;
        }
        if dismissed.changed().await.is_err() {
            return;
        }
    }
}
