use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::recording::RecordingArtifact;

/// Region of the hosting view, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayFrame {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Media player driving one overlay
#[async_trait::async_trait]
pub trait MediaPlayer: Send {
    /// Play from the current position
    async fn play(&mut self) -> Result<()>;

    /// Move the playhead back to zero
    async fn seek_to_start(&mut self) -> Result<()>;

    /// Stop playback and remove the overlay
    async fn release(&mut self) -> Result<()>;
}

/// Creates players for artifacts
pub trait PlayerFactory: Send + Sync {
    fn create(
        &self,
        artifact: &RecordingArtifact,
        overlay: OverlayFrame,
    ) -> Result<Box<dyn MediaPlayer>>;

    fn name(&self) -> &str;
}

/// Plays artifacts in a borderless `ffplay` window placed at the overlay
pub struct FfplayFactory {
    program: String,
}

impl FfplayFactory {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfplayFactory {
    fn default() -> Self {
        Self::new("ffplay")
    }
}

impl PlayerFactory for FfplayFactory {
    fn create(
        &self,
        artifact: &RecordingArtifact,
        overlay: OverlayFrame,
    ) -> Result<Box<dyn MediaPlayer>> {
        Ok(Box::new(FfplayPlayer {
            program: self.program.clone(),
            path: artifact.path.clone(),
            overlay,
            child: None,
        }))
    }

    fn name(&self) -> &str {
        "ffplay"
    }
}

pub struct FfplayPlayer {
    program: String,
    path: PathBuf,
    overlay: OverlayFrame,
    child: Option<Child>,
}

impl FfplayPlayer {
    async fn kill(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                child.kill().await.context("Failed to stop ffplay")?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MediaPlayer for FfplayPlayer {
    async fn play(&mut self) -> Result<()> {
        if let Some(child) = &mut self.child {
            if child.try_wait()?.is_none() {
                debug!("ffplay already playing {}", self.path.display());
                return Ok(());
            }
        }

        let title = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording".to_string());

        let child = Command::new(&self.program)
            .args(["-loglevel", "error", "-autoexit", "-noborder"])
            .args(["-left", &self.overlay.x.to_string()])
            .args(["-top", &self.overlay.y.to_string()])
            .args(["-x", &self.overlay.width.to_string()])
            .args(["-y", &self.overlay.height.to_string()])
            .args(["-window_title", &title])
            .arg(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch {}", self.program))?;

        info!("Playing {} in overlay {:?}", self.path.display(), self.overlay);
        self.child = Some(child);
        Ok(())
    }

    async fn seek_to_start(&mut self) -> Result<()> {
        // ffplay has no remote control; restarting plays from zero
        self.kill().await
    }

    async fn release(&mut self) -> Result<()> {
        if let Err(e) = self.kill().await {
            warn!("Failed to release player for {}: {}", self.path.display(), e);
            return Err(e);
        }
        debug!("Released player for {}", self.path.display());
        Ok(())
    }
}
