//! Overlay events
//!
//! Every message pushed to overlay clients is one `OverlayEvent`, serialized
//! as a flat JSON object with a `type` discriminator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Effects, Level, Score};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayEvent {
    /// First event on every new stream
    Hello,
    Vote(VoteEvent),
    Theme { hue_deg: u16 },
    Preview { active: bool, score: Score },
    Settings(SettingsEvent),
    CacheCleared { deleted: usize },
}

impl OverlayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OverlayEvent::Hello => "hello",
            OverlayEvent::Vote(_) => "vote",
            OverlayEvent::Theme { .. } => "theme",
            OverlayEvent::Preview { .. } => "preview",
            OverlayEvent::Settings(_) => "settings",
            OverlayEvent::CacheCleared { .. } => "cache_cleared",
        }
    }

    /// Compact JSON for the wire
    pub fn to_json(&self) -> String {
        // serializing plain data with string keys cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteEvent {
    pub enable_tts: bool,
    pub enable_dingdong: bool,
    pub score: Score,
    /// Per-score message, useful for logs and API consumers
    pub message: String,
    /// Quote displayed and spoken by the overlay
    pub quote: String,
    /// Empty when no audio was produced
    pub audio_url: String,
    pub level: Level,
    pub duration_ms: u64,
    pub effects: Effects,
    pub ts: String,
}

/// Live overlay settings, pushed whenever they change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsEvent {
    pub enable_tts: bool,
    pub enable_dingdong: bool,
    pub hide_on_audio_end: bool,
    pub duration_ms: u64,
    pub min_linger_ms: u64,
    pub effects: Effects,
}

/// ISO-8601 UTC with a `Z` suffix, second precision
pub fn utc_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
