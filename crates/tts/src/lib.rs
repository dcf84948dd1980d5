//! Text-to-speech for the landing judge
//!
//! Providers:
//! - `polly`: Amazon Polly, SigV4-signed REST calls
//! - `neural`: ElevenLabs-compatible neural voice service
//! - `local`: the operating system's speech engine
//!
//! `SpeechService` walks the configured provider chain and serves clips
//! through the content-addressed `AudioCache`.

pub mod cache;
pub mod local;
pub mod neural;
pub mod polly;
pub mod service;
pub mod sigv4;
pub mod stub;

pub use cache::{AudioCache, AudioEntry, AudioIndex, CachedClip, ClearReport};
pub use local::{LocalConfig, LocalSynthesizer};
pub use neural::{NeuralConfig, NeuralSynthesizer};
pub use polly::{PollyConfig, PollySynthesizer};
pub use service::{provider_chain, ProviderFactory, SettingsProviders, SpeechService, StaticProviders};
pub use stub::StubSynthesizer;
