use serde::{Deserialize, Serialize};

use super::preset::SessionPreset;
use crate::capture::{Facing, LensClass};

/// How a capture session should be wired at setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Camera lens classes in priority order
    /// Default: ultra-wide, then wide-angle
    pub preferred_lenses: Vec<LensClass>,

    /// Which camera position to look up
    pub facing: Facing,

    /// Wire a microphone input when one is available
    /// Without a microphone the session records video only.
    pub include_audio: bool,

    /// Quality tiers to try, best first; `Default` is used when none apply
    pub preferred_presets: Vec<SessionPreset>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preferred_lenses: vec![LensClass::UltraWide, LensClass::WideAngle],
            facing: Facing::Back,
            include_audio: true,
            preferred_presets: vec![SessionPreset::Hd1080],
        }
    }
}
