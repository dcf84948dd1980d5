//! Speech synthesis abstraction
//!
//! Three interchangeable providers sit behind `SpeechSynthesizer`; the cache
//! and fallback logic only ever talks to this trait.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::Result;

/// Which provider produced (or should produce) a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Amazon Polly
    Polly,
    /// Third-party neural voice web service
    Neural,
    /// Operating system speech engine
    Local,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Polly, ProviderKind::Neural, ProviderKind::Local];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Polly => "polly",
            ProviderKind::Neural => "neural",
            ProviderKind::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polly" | "aws" => Ok(ProviderKind::Polly),
            "neural" | "elevenlabs" => Ok(ProviderKind::Neural),
            "local" | "sapi" | "system" => Ok(ProviderKind::Local),
            other => Err(format!("unknown TTS provider: {other}")),
        }
    }
}

/// Everything that determines the produced audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub provider: ProviderKind,
    pub text: String,
    pub voice: String,
    /// Provider-specific engine (Polly engine, neural model id, "system")
    pub engine: String,
    pub format: String,
    /// AWS region for Polly, "local" or the service host otherwise
    pub region: String,
}

impl SynthesisRequest {
    /// Content address of the clip this request produces
    pub fn cache_key(&self) -> String {
        let material = format!(
            "{}|voice={}|engine={}|fmt={}|region={}|provider={}",
            self.text, self.voice, self.engine, self.format, self.region, self.provider
        );
        short_hash(&material)
    }

    /// Same request with a different engine
    pub fn with_engine(&self, engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            ..self.clone()
        }
    }

    /// Cache file name; `extension` comes from the synthesized audio
    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "quote_{}_{}_{}_{}.{}",
            self.provider,
            safe_component(&self.voice),
            safe_component(&self.engine),
            short_hash(&self.text),
            extension
        )
    }
}

/// Encoded audio returned by a provider
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub extension: String,
    /// Engine actually used, may differ from the request after a retry
    pub engine: String,
}

/// Voice catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    pub language_code: String,
    pub language_name: String,
    pub engines: Vec<String>,
    pub provider: ProviderKind,
}

/// A speech synthesis provider
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the provider has what it needs to attempt synthesis
    fn is_available(&self) -> bool;

    /// Resolve provider-specific details (voice id, engine) before the cache lookup
    async fn prepare(&self, request: SynthesisRequest) -> SynthesisRequest {
        request
    }

    /// Synthesize encoded audio for the request
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio>;

    /// Voices this provider offers
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>>;
}

/// First 12 hex chars of SHA-256
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(12);
    hex
}

/// Keep only characters safe in a file name
pub fn safe_component(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}
