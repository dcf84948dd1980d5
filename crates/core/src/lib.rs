//! Core types and traits for the landing judge
//!
//! Everything the other crates agree on lives here:
//! - `Score` / `Level`: the 1–10 rating and its colour tier
//! - `Effects` / `EffectPreset`: overlay audio ambience selection
//! - `OverlayEvent`: the JSON messages fanned out to overlay clients
//! - `SpeechSynthesizer`: the seam between the server and the TTS providers

pub mod effects;
pub mod error;
pub mod event;
pub mod score;
pub mod speech;

pub use effects::{EffectPreset, Effects, NoiseKind};
pub use error::TtsError;
pub use event::{utc_timestamp, OverlayEvent, SettingsEvent, VoteEvent};
pub use score::{Level, Score};
pub use speech::{
    ProviderKind, SpeechSynthesizer, SynthesisRequest, SynthesizedAudio, VoiceInfo,
};

/// Result alias for speech operations
pub type Result<T> = std::result::Result<T, TtsError>;
