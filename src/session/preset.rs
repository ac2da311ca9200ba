use serde::{Deserialize, Serialize};

/// Session quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPreset {
    /// 3840x2160
    #[serde(rename = "hd4k")]
    Hd4K,
    /// 1920x1080
    Hd1080,
    /// 1280x720
    Hd720,
    /// 640x480
    Vga,
    /// Whatever the device combination delivers by default; always available
    Default,
}

impl SessionPreset {
    /// Frame dimensions (width, height)
    ///
    /// `Default` maps to the 720p layout devices report when no preset is forced.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SessionPreset::Hd4K => (3840, 2160),
            SessionPreset::Hd1080 => (1920, 1080),
            SessionPreset::Hd720 | SessionPreset::Default => (1280, 720),
            SessionPreset::Vga => (640, 480),
        }
    }
}

impl Default for SessionPreset {
    fn default() -> Self {
        Self::Default
    }
}

/// Pick the first tier in `desired` that `supported` accepts, else `Default`
pub fn negotiate_quality(
    desired: &[SessionPreset],
    mut supported: impl FnMut(SessionPreset) -> bool,
) -> SessionPreset {
    desired
        .iter()
        .copied()
        .find(|preset| supported(*preset))
        .unwrap_or(SessionPreset::Default)
}
