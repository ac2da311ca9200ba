// Virtual capture hardware
//
// Devices described in memory (or in the config file) that stream a
// synthetic test pattern and a sine tone. Lets the whole capture graph run
// without a camera, e.g. in CI or on a headless box.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::backend::{
    AudioFormat, AudioFrame, CaptureBackend, DeviceDescriptor, DeviceKind, Facing, LensClass,
    MediaSample, StreamRequest, TrackFormat, VideoFrame,
};
use crate::session::SessionPreset;

const AUDIO_SAMPLE_RATE: u32 = 48000;
const TONE_HZ: f32 = 440.0;

/// Highest frame rate the synthetic stream can be driven at
pub const MAX_FRAME_RATE: u32 = 1000;

/// A device in the virtual hardware profile
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    pub descriptor: DeviceDescriptor,
    /// Presets this device can deliver besides `Default`
    pub presets: Vec<SessionPreset>,
}

impl VirtualDevice {
    pub fn camera(
        id: &str,
        lens: LensClass,
        facing: Facing,
        presets: Vec<SessionPreset>,
    ) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                id: id.to_string(),
                name: format!("Virtual {:?} {:?} Camera", facing, lens),
                kind: DeviceKind::Camera,
                lens: Some(lens),
                facing: Some(facing),
                openable: true,
                is_default: false,
            },
            presets,
        }
    }

    pub fn microphone(id: &str, is_default: bool) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                id: id.to_string(),
                name: "Virtual Microphone".to_string(),
                kind: DeviceKind::Microphone,
                lens: None,
                facing: None,
                openable: true,
                is_default,
            },
            presets: Vec::new(),
        }
    }

    /// Mark the device as present but impossible to open (e.g. in use elsewhere)
    pub fn unopenable(mut self) -> Self {
        self.descriptor.openable = false;
        self
    }
}

/// Hardware profile entry as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct VirtualDeviceConfig {
    pub id: String,
    pub name: Option<String>,
    pub kind: DeviceKind,
    pub lens: Option<LensClass>,
    pub facing: Option<Facing>,
    #[serde(default = "default_true")]
    pub openable: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub presets: Vec<SessionPreset>,
}

fn default_true() -> bool {
    true
}

impl From<&VirtualDeviceConfig> for VirtualDevice {
    fn from(cfg: &VirtualDeviceConfig) -> Self {
        let name = cfg
            .name
            .clone()
            .unwrap_or_else(|| format!("Virtual {}", cfg.kind));

        Self {
            descriptor: DeviceDescriptor {
                id: cfg.id.clone(),
                name,
                kind: cfg.kind,
                lens: cfg.lens,
                facing: cfg.facing,
                openable: cfg.openable,
                is_default: cfg.default,
            },
            presets: cfg.presets.clone(),
        }
    }
}

struct StreamTask {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// In-process capture backend
pub struct VirtualBackend {
    devices: Vec<VirtualDevice>,
    frame_rate: u32,
    stream: Mutex<Option<StreamTask>>,
    capturing: Arc<AtomicBool>,
}

impl VirtualBackend {
    pub fn new(devices: Vec<VirtualDevice>) -> Self {
        Self {
            devices,
            frame_rate: 30,
            stream: Mutex::new(None),
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(devices: &[VirtualDeviceConfig]) -> Self {
        Self::new(devices.iter().map(VirtualDevice::from).collect())
    }

    /// Back ultra-wide and wide-angle cameras, a front camera and a microphone
    pub fn phone() -> Self {
        use SessionPreset::*;

        Self::new(vec![
            VirtualDevice::camera(
                "back-ultra-wide",
                LensClass::UltraWide,
                Facing::Back,
                vec![Hd1080, Hd720],
            ),
            VirtualDevice::camera(
                "back-wide",
                LensClass::WideAngle,
                Facing::Back,
                vec![Hd4K, Hd1080, Hd720, Vga],
            ),
            VirtualDevice::camera(
                "front-wide",
                LensClass::WideAngle,
                Facing::Front,
                vec![Hd1080, Hd720],
            ),
            VirtualDevice::microphone("builtin-mic", true),
        ])
    }

    /// Frames per second, clamped to `1..=MAX_FRAME_RATE`
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate.clamp(1, MAX_FRAME_RATE);
        self
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn find(&self, device: &DeviceDescriptor) -> Option<&VirtualDevice> {
        self.devices.iter().find(|d| d.descriptor.id == device.id)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for VirtualBackend {
    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.devices.iter().map(|d| d.descriptor.clone()).collect()
    }

    fn supports_preset(&self, device: &DeviceDescriptor, preset: SessionPreset) -> bool {
        if preset == SessionPreset::Default {
            return true;
        }

        match self.find(device) {
            // Microphones don't constrain video quality
            Some(d) if d.descriptor.kind == DeviceKind::Microphone => true,
            Some(d) => d.presets.contains(&preset),
            None => false,
        }
    }

    fn stream_format(&self, request: &StreamRequest) -> TrackFormat {
        let (width, height) = request.preset.dimensions();

        TrackFormat {
            width,
            height,
            frame_rate: self.frame_rate,
            audio: request.microphone.as_ref().map(|_| AudioFormat {
                sample_rate: AUDIO_SAMPLE_RATE,
                channels: 1,
            }),
        }
    }

    async fn start(&self, request: &StreamRequest) -> Result<mpsc::Receiver<MediaSample>> {
        if self.capturing.load(Ordering::SeqCst) {
            bail!("Already capturing");
        }

        for device in std::iter::once(&request.camera).chain(request.microphone.iter()) {
            match self.find(device) {
                Some(d) if d.descriptor.openable => {}
                Some(_) => bail!("Device {} cannot be opened", device.id),
                None => bail!("Device {} is not connected", device.id),
            }
        }

        let format = self.stream_format(request);
        info!(
            "Starting virtual stream: {} @ {}x{} {}fps (audio: {})",
            request.camera.name,
            format.width,
            format.height,
            format.frame_rate,
            format.audio.is_some()
        );

        let (tx, rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = oneshot::channel();
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(generate_samples(format, tx, stop_rx, capturing));

        match self.stream.lock() {
            Ok(mut stream) => *stream = Some(StreamTask { stop_tx, handle }),
            Err(_) => bail!("Virtual stream state poisoned"),
        }

        Ok(rx)
    }

    async fn stop(&self) -> Result<()> {
        let task = match self.stream.lock() {
            Ok(mut stream) => stream.take(),
            Err(_) => bail!("Virtual stream state poisoned"),
        };

        let Some(task) = task else {
            return Ok(());
        };

        info!("Stopping virtual stream");
        let _ = task.stop_tx.send(());
        if let Err(e) = task.handle.await {
            error!("Virtual stream task panicked: {}", e);
        }
        self.capturing.store(false, Ordering::SeqCst);

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "virtual"
    }
}

async fn generate_samples(
    format: TrackFormat,
    tx: mpsc::Sender<MediaSample>,
    mut stop_rx: oneshot::Receiver<()>,
    capturing: Arc<AtomicBool>,
) {
    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(format.frame_rate.max(1)));
    let mut ticker = tokio::time::interval(frame_interval);
    let frame_bytes = (format.width * format.height * 3) as usize;
    let mut frame_index: u64 = 0;
    let mut audio_position: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let timestamp_ms = frame_index * 1000 / format.frame_rate as u64;
                let shade = (frame_index * 3 % 256) as u8;

                let video = MediaSample::Video(Arc::new(VideoFrame {
                    width: format.width,
                    height: format.height,
                    data: vec![shade; frame_bytes],
                    timestamp_ms,
                }));
                if tx.send(video).await.is_err() {
                    break;
                }

                if let Some(audio) = format.audio {
                    let count = (audio.sample_rate / format.frame_rate) as u64;
                    let samples = (audio_position..audio_position + count)
                        .map(|n| {
                            let t = n as f32 / audio.sample_rate as f32;
                            ((2.0 * PI * TONE_HZ * t).sin() * i16::MAX as f32 * 0.2) as i16
                        })
                        .collect();
                    audio_position += count;

                    let frame = MediaSample::Audio(Arc::new(AudioFrame {
                        samples,
                        sample_rate: audio.sample_rate,
                        channels: audio.channels,
                        timestamp_ms,
                    }));
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }

                frame_index += 1;
            }
        }
    }

    capturing.store(false, Ordering::SeqCst);
}
