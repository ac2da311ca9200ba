use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::player::{MediaPlayer, OverlayFrame, PlayerFactory};
use crate::error::{CaptureError, CaptureResult};
use crate::recording::RecordingArtifact;

/// Geometry of the view hosting the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostView {
    pub width: u32,
    pub height: u32,
    /// Inset from the top edge (status bar, notch)
    pub top_margin: u32,
}

impl Default for HostView {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            top_margin: 20,
        }
    }
}

impl OverlayFrame {
    /// Quarter-size inset in the top-left corner, below the top margin
    pub fn inset_for(host: &HostView) -> Self {
        Self {
            x: 0,
            y: host.top_margin as i32,
            width: host.width / 4,
            height: host.height / 4,
        }
    }
}

/// Phase of a tap gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
    Cancelled,
    Failed,
}

/// An artifact on screen
pub struct PlaybackSession {
    pub artifact: RecordingArtifact,
    pub overlay: OverlayFrame,
    player: Box<dyn MediaPlayer>,
}

/// Shows finished recordings in a single overlay
///
/// Presenting a new artifact always releases the previous player first, so
/// at most one overlay exists at a time.
pub struct PlaybackTrigger {
    players: Arc<dyn PlayerFactory>,
    host: HostView,
    current: Option<PlaybackSession>,
}

impl PlaybackTrigger {
    pub fn new(players: Arc<dyn PlayerFactory>, host: HostView) -> Self {
        Self {
            players,
            host,
            current: None,
        }
    }

    /// Replace the overlay with `artifact` and play it from the start
    pub async fn present(&mut self, artifact: RecordingArtifact) -> CaptureResult<()> {
        self.dismiss().await;

        let overlay = OverlayFrame::inset_for(&self.host);
        let mut player = self
            .players
            .create(&artifact, overlay)
            .map_err(CaptureError::Backend)?;

        if let Err(e) = player.play().await {
            let _ = player.release().await;
            return Err(CaptureError::Backend(e));
        }

        info!(
            "Presenting {} via {}",
            artifact.path.display(),
            self.players.name()
        );
        self.current = Some(PlaybackSession {
            artifact,
            overlay,
            player,
        });
        Ok(())
    }

    /// Restart the current artifact from zero
    ///
    /// Returns false without doing anything when nothing has been presented.
    pub async fn replay(&mut self) -> CaptureResult<bool> {
        let Some(session) = &mut self.current else {
            debug!("Replay requested with nothing to play");
            return Ok(false);
        };

        session
            .player
            .seek_to_start()
            .await
            .map_err(CaptureError::Backend)?;
        session.player.play().await.map_err(CaptureError::Backend)?;

        info!("Replaying {}", session.artifact.path.display());
        Ok(true)
    }

    /// Replay on a completed tap; other phases are ignored
    pub async fn on_tap(&mut self, phase: GesturePhase) -> CaptureResult<bool> {
        match phase {
            GesturePhase::Ended => self.replay().await,
            other => {
                debug!("Ignoring tap phase {:?}", other);
                Ok(false)
            }
        }
    }

    /// Release the current overlay, if any
    pub async fn dismiss(&mut self) {
        if let Some(mut previous) = self.current.take() {
            if let Err(e) = previous.player.release().await {
                warn!(
                    "Failed to release overlay for {}: {}",
                    previous.artifact.path.display(),
                    e
                );
            }
        }
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.current.as_ref()
    }

    pub fn host(&self) -> HostView {
        self.host
    }
}
