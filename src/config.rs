use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::capture::{VirtualDeviceConfig, MAX_FRAME_RATE};
use crate::permission::PermissionStatus;
use crate::playback::HostView;
use crate::recording::ArtifactStore;
use crate::screen::ScreenConfig;
use crate::session::SessionConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: SessionConfig,
    pub storage: StorageConfig,
    pub playback: PlaybackConfig,
    pub encoder: EncoderConfig,
    pub permission: PermissionConfig,
    /// Hardware profile for the virtual backend; empty means the built-in phone profile
    pub virtual_devices: Vec<VirtualDeviceConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where recordings go; defaults to the documents directory
    pub recordings_path: Option<PathBuf>,
    pub extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recordings_path: None,
            extension: "mov".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Present each finished recording automatically
    pub enabled: bool,
    pub host_width: u32,
    pub host_height: u32,
    pub top_margin: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let host = HostView::default();
        Self {
            enabled: true,
            host_width: host.width,
            host_height: host.height,
            top_margin: host.top_margin,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg: String,
    pub ffplay: String,
    pub frame_rate: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffplay: "ffplay".to_string(),
            frame_rate: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub status: PermissionStatus,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            status: PermissionStatus::Granted,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let frame_rate = self.encoder.frame_rate;
        if !(1..=MAX_FRAME_RATE).contains(&frame_rate) {
            bail!(
                "encoder.frame_rate must be between 1 and {}, got {}",
                MAX_FRAME_RATE,
                frame_rate
            );
        }
        Ok(())
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        let dir = self
            .storage
            .recordings_path
            .clone()
            .unwrap_or_else(ArtifactStore::default_dir);
        ArtifactStore::new(dir, self.storage.extension.clone())
    }

    pub fn host_view(&self) -> HostView {
        HostView {
            width: self.playback.host_width,
            height: self.playback.host_height,
            top_margin: self.playback.top_margin,
        }
    }

    pub fn screen_config(&self) -> ScreenConfig {
        ScreenConfig {
            session: self.capture.clone(),
            store: self.artifact_store(),
            host: self.host_view(),
            autoplay: self.playback.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceKind, LensClass};
    use crate::session::SessionPreset;
    use std::io::Write;

    #[test]
    fn test_load_partial_file_uses_defaults() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            r#"
[capture]
preferred_lenses = ["wide_angle"]
include_audio = false

[storage]
recordings_path = "/tmp/recordings"

[[virtual_devices]]
id = "cam"
kind = "camera"
lens = "wide_angle"
facing = "back"
presets = ["hd720"]
"#
        )?;

        let path = file.path().to_string_lossy().to_string();
        let cfg = Config::load(&path)?;

        assert_eq!(cfg.capture.preferred_lenses, vec![LensClass::WideAngle]);
        assert!(!cfg.capture.include_audio);
        assert_eq!(cfg.capture.preferred_presets, vec![SessionPreset::Hd1080]);
        assert_eq!(cfg.storage.extension, "mov");
        assert_eq!(cfg.artifact_store().dir(), std::path::Path::new("/tmp/recordings"));
        assert_eq!(cfg.permission.status, PermissionStatus::Granted);
        assert_eq!(cfg.virtual_devices.len(), 1);
        assert_eq!(cfg.virtual_devices[0].kind, DeviceKind::Camera);
        assert!(cfg.virtual_devices[0].openable);

        Ok(())
    }

    #[test]
    fn test_out_of_range_frame_rate_is_rejected() -> Result<()> {
        for frame_rate in [0, MAX_FRAME_RATE + 1] {
            let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
            writeln!(file, "[encoder]\nframe_rate = {}", frame_rate)?;

            let path = file.path().to_string_lossy().to_string();
            let err = Config::load(&path).unwrap_err();
            assert!(err.to_string().contains("frame_rate"), "{}", err);
        }

        Ok(())
    }

    #[test]
    fn test_default_config_records_with_audio() {
        let cfg = Config::default();
        assert!(cfg.capture.include_audio);
        assert!(cfg.playback.enabled);
        assert_eq!(cfg.encoder.frame_rate, 30);
    }
}
