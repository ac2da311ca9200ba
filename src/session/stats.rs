use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::preset::SessionPreset;
use super::session::OutputKind;

/// Point-in-time view of a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier used in logs
    pub session_id: String,

    /// Whether data is flowing
    pub running: bool,

    /// Whether a configuration transaction is open
    pub configuring: bool,

    /// Active quality tier
    pub preset: SessionPreset,

    /// Names of the wired input devices, in insertion order
    pub inputs: Vec<String>,

    pub outputs: Vec<OutputKind>,

    /// When the data flow last started
    pub started_at: Option<DateTime<Utc>>,

    /// Samples routed since the session was created
    pub samples_routed: u64,
}
