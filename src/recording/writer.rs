// Movie writers
//
// A `MovieSink` opens one `MovieWriter` per recording. The ffmpeg writer
// pipes raw RGB frames into an encoder process and buffers audio into a
// temporary WAV; finalize muxes both into the single destination file.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

use crate::capture::{MediaSample, TrackFormat};

/// Writes the samples of one recording to its destination
#[async_trait::async_trait]
pub trait MovieWriter: Send {
    async fn write(&mut self, sample: &MediaSample) -> io::Result<()>;

    /// Flush and close; the file is complete once this returns `Ok`
    async fn finalize(&mut self) -> io::Result<()>;
}

/// Opens movie writers
#[async_trait::async_trait]
pub trait MovieSink: Send + Sync {
    /// Open `path` for a recording with track layout `format`
    async fn create(&self, path: &Path, format: &TrackFormat) -> io::Result<Box<dyn MovieWriter>>;

    fn name(&self) -> &str;
}

/// Encodes recordings to QuickTime movies with an external `ffmpeg`
pub struct FfmpegSink {
    program: String,
}

impl FfmpegSink {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegSink {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait::async_trait]
impl MovieSink for FfmpegSink {
    async fn create(&self, path: &Path, format: &TrackFormat) -> io::Result<Box<dyn MovieWriter>> {
        // Fail early if the destination can't be opened
        tokio::fs::File::create(path).await?;

        match self.spawn_writer(path, format).await {
            Ok(writer) => Ok(writer),
            Err(e) => {
                warn!("Could not start encoder for {}: {}", path.display(), e);
                for leftover in [
                    path.to_path_buf(),
                    sidecar(path, "video.mov"),
                    sidecar(path, "audio.wav"),
                ] {
                    if let Err(e) = tokio::fs::remove_file(&leftover).await {
                        debug!("Nothing to remove at {}: {}", leftover.display(), e);
                    }
                }
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

impl FfmpegSink {
    async fn spawn_writer(
        &self,
        path: &Path,
        format: &TrackFormat,
    ) -> io::Result<Box<dyn MovieWriter>> {
        let video_path = match format.audio {
            Some(_) => sidecar(path, "video.mov"),
            None => path.to_path_buf(),
        };

        let mut encoder = Command::new(&self.program)
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pixel_format",
                "rgb24",
                "-video_size",
                &format!("{}x{}", format.width, format.height),
                "-framerate",
                &format.frame_rate.to_string(),
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-pix_fmt",
                "yuv420p",
                "-f",
                "mov",
            ])
            .arg(&video_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = encoder
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("ffmpeg stdin unavailable"))?;

        let audio = match format.audio {
            Some(audio) => {
                let wav_path = sidecar(path, "audio.wav");
                let spec = hound::WavSpec {
                    channels: audio.channels,
                    sample_rate: audio.sample_rate,
                    bits_per_sample: 16,
                    sample_format: hound::SampleFormat::Int,
                };
                let writer = hound::WavWriter::create(&wav_path, spec).map_err(wav_error)?;
                Some((wav_path, writer))
            }
            None => None,
        };

        info!(
            "Started ffmpeg encoder: {}x{} @ {}fps, audio: {}, output: {}",
            format.width,
            format.height,
            format.frame_rate,
            audio.is_some(),
            path.display()
        );

        Ok(Box::new(FfmpegWriter {
            program: self.program.clone(),
            path: path.to_path_buf(),
            video_path,
            frame_bytes: (format.width * format.height * 3) as usize,
            encoder: Some(encoder),
            stdin: Some(stdin),
            audio,
            frames: 0,
        }))
    }
}

struct FfmpegWriter {
    program: String,
    path: PathBuf,
    /// Encoder output; equals `path` for video-only recordings
    video_path: PathBuf,
    frame_bytes: usize,
    encoder: Option<Child>,
    stdin: Option<ChildStdin>,
    audio: Option<(PathBuf, hound::WavWriter<BufWriter<File>>)>,
    frames: u64,
}

#[async_trait::async_trait]
impl MovieWriter for FfmpegWriter {
    async fn write(&mut self, sample: &MediaSample) -> io::Result<()> {
        match sample {
            MediaSample::Video(frame) => {
                if frame.data.len() != self.frame_bytes {
                    warn!(
                        "Skipping {}x{} frame, encoder expects {} bytes",
                        frame.width, frame.height, self.frame_bytes
                    );
                    return Ok(());
                }
                if let Some(stdin) = &mut self.stdin {
                    stdin.write_all(&frame.data).await?;
                    self.frames += 1;
                }
            }
            MediaSample::Audio(frame) => {
                if let Some((_, writer)) = &mut self.audio {
                    for &sample in &frame.samples {
                        writer.write_sample(sample).map_err(wav_error)?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn finalize(&mut self) -> io::Result<()> {
        // Closing stdin signals EOF to the encoder
        drop(self.stdin.take());

        if let Some(encoder) = self.encoder.take() {
            let output = encoder.wait_with_output().await?;
            if !output.status.success() {
                return Err(io::Error::other(format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }

        if let Some((wav_path, writer)) = self.audio.take() {
            writer.finalize().map_err(wav_error)?;
            let muxed = self.mux(&wav_path).await;

            for temp in [&wav_path, &self.video_path] {
                if let Err(e) = tokio::fs::remove_file(temp).await {
                    debug!("Could not remove {}: {}", temp.display(), e);
                }
            }
            muxed?;
        }

        info!(
            "ffmpeg finished: {} frames, output: {}",
            self.frames,
            self.path.display()
        );
        Ok(())
    }
}

impl FfmpegWriter {
    async fn mux(&self, wav_path: &Path) -> io::Result<()> {
        let output = Command::new(&self.program)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(&self.video_path)
            .arg("-i")
            .arg(wav_path)
            .args(["-c:v", "copy", "-c:a", "aac", "-shortest", "-f", "mov"])
            .arg(&self.path)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "ffmpeg mux exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// `<path>.<suffix>` next to the destination, e.g. `clip.mov.audio.wav`
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn wav_error(e: hound::Error) -> io::Error {
    match e {
        hound::Error::IoError(e) => e,
        other => io::Error::other(other.to_string()),
    }
}
