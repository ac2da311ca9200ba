// Shared test doubles
//
// MemorySink records what each writer received instead of encoding, and
// FakePlayers counts live overlays so leaks show up as live > 1.

#![allow(dead_code)]

use anyhow::Result;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use video_recorder::capture::{MediaSample, TrackFormat};
use video_recorder::permission::{PermissionProvider, PermissionStatus};
use video_recorder::playback::{MediaPlayer, OverlayFrame, PlayerFactory};
use video_recorder::recording::{MovieSink, MovieWriter, RecordingArtifact};
use video_recorder::DeviceKind;

/// What a finalized writer saw
#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub format: TrackFormat,
    pub video_frames: u64,
    pub audio_frames: u64,
}

#[derive(Default)]
pub struct MemorySink {
    fail_create: bool,
    fail_writes: bool,
    finalize_delay: Duration,
    finished: Arc<Mutex<Vec<WrittenFile>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `create` fails as if the destination were read-only
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// Destinations open, but every write fails as if the disk were full
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn with_finalize_delay(delay: Duration) -> Self {
        Self {
            finalize_delay: delay,
            ..Self::default()
        }
    }

    pub fn finished(&self) -> Vec<WrittenFile> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MovieSink for MemorySink {
    async fn create(&self, path: &Path, format: &TrackFormat) -> io::Result<Box<dyn MovieWriter>> {
        if self.fail_create {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }

        let file = std::fs::File::create(path)?;
        Ok(Box::new(MemoryWriter {
            file,
            written: WrittenFile {
                path: path.to_path_buf(),
                format: *format,
                video_frames: 0,
                audio_frames: 0,
            },
            delay: self.finalize_delay,
            fail_writes: self.fail_writes,
            finished: Arc::clone(&self.finished),
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemoryWriter {
    file: std::fs::File,
    written: WrittenFile,
    delay: Duration,
    fail_writes: bool,
    finished: Arc<Mutex<Vec<WrittenFile>>>,
}

#[async_trait::async_trait]
impl MovieWriter for MemoryWriter {
    async fn write(&mut self, sample: &MediaSample) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::other("disk full"));
        }

        match sample {
            MediaSample::Video(frame) => {
                writeln!(self.file, "v {}", frame.timestamp_ms)?;
                self.written.video_frames += 1;
            }
            MediaSample::Audio(frame) => {
                writeln!(self.file, "a {}", frame.timestamp_ms)?;
                self.written.audio_frames += 1;
            }
        }
        Ok(())
    }

    async fn finalize(&mut self) -> io::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.file.flush()?;
        self.finished.lock().unwrap().push(self.written.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PlayerStats {
    pub created: usize,
    pub live: usize,
    pub plays: usize,
    pub seeks: usize,
    pub overlays: Vec<OverlayFrame>,
    pub artifacts: Vec<PathBuf>,
}

#[derive(Default, Clone)]
pub struct FakePlayers {
    stats: Arc<Mutex<PlayerStats>>,
    fail: bool,
}

impl FakePlayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Players that fail to start
    pub fn broken() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.stats.lock().unwrap().created
    }

    pub fn live(&self) -> usize {
        self.stats.lock().unwrap().live
    }

    pub fn plays(&self) -> usize {
        self.stats.lock().unwrap().plays
    }

    pub fn seeks(&self) -> usize {
        self.stats.lock().unwrap().seeks
    }

    pub fn overlays(&self) -> Vec<OverlayFrame> {
        self.stats.lock().unwrap().overlays.clone()
    }

    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.stats.lock().unwrap().artifacts.clone()
    }
}

impl PlayerFactory for FakePlayers {
    fn create(
        &self,
        artifact: &RecordingArtifact,
        overlay: OverlayFrame,
    ) -> Result<Box<dyn MediaPlayer>> {
        let mut stats = self.stats.lock().unwrap();
        stats.created += 1;
        stats.live += 1;
        stats.overlays.push(overlay);
        stats.artifacts.push(artifact.path.clone());

        Ok(Box::new(FakePlayer {
            stats: Arc::clone(&self.stats),
            fail: self.fail,
            released: false,
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakePlayer {
    stats: Arc<Mutex<PlayerStats>>,
    fail: bool,
    released: bool,
}

#[async_trait::async_trait]
impl MediaPlayer for FakePlayer {
    async fn play(&mut self) -> Result<()> {
        if self.fail {
            anyhow::bail!("no display");
        }
        self.stats.lock().unwrap().plays += 1;
        Ok(())
    }

    async fn seek_to_start(&mut self) -> Result<()> {
        self.stats.lock().unwrap().seeks += 1;
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            self.stats.lock().unwrap().live -= 1;
        }
        Ok(())
    }
}

/// Different answers for camera and microphone
pub struct PerKindPermissions {
    pub camera: PermissionStatus,
    pub microphone: PermissionStatus,
}

#[async_trait::async_trait]
impl PermissionProvider for PerKindPermissions {
    async fn request_access(&self, kind: DeviceKind) -> PermissionStatus {
        match kind {
            DeviceKind::Camera => self.camera,
            DeviceKind::Microphone => self.microphone,
        }
    }
}

/// A permission prompt the user never answers
pub struct PendingPermissions;

#[async_trait::async_trait]
impl PermissionProvider for PendingPermissions {
    async fn request_access(&self, _kind: DeviceKind) -> PermissionStatus {
        std::future::pending().await
    }
}
