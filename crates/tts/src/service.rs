//! Speech service: provider selection, fallback and caching
//!
//! Settings are re-read on every vote, so providers are resolved per call.
//! The Polly client is kept between calls while its region and credentials
//! stay the same, which keeps its voice catalog warm.

use landing_judge_config::Settings;
use landing_judge_core::speech::short_hash;
use landing_judge_core::{ProviderKind, Result, SpeechSynthesizer, SynthesisRequest, VoiceInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{AudioCache, ClearReport};
use crate::local::{LocalConfig, LocalSynthesizer};
use crate::neural::{NeuralConfig, NeuralSynthesizer};
use crate::polly::{PollyConfig, PollySynthesizer};

/// Resolves a provider for the current settings
pub trait ProviderFactory: Send + Sync {
    fn provider(&self, kind: ProviderKind, settings: &Settings) -> Arc<dyn SpeechSynthesizer>;
}

/// Real providers built from settings
#[derive(Default)]
pub struct SettingsProviders {
    polly: Mutex<Option<(String, Arc<PollySynthesizer>)>>,
}

impl SettingsProviders {
    pub fn new() -> Self {
        Self::default()
    }

    fn polly(&self, settings: &Settings) -> Arc<PollySynthesizer> {
        let fingerprint = format!(
            "{}|{}|{}|{}",
            settings.aws_region,
            settings.aws_access_key_id,
            short_hash(&settings.aws_secret_access_key),
            short_hash(&settings.aws_session_token),
        );
        let mut slot = self.polly.lock();
        if let Some((current, polly)) = slot.as_ref() {
            if *current == fingerprint {
                return Arc::clone(polly);
            }
        }
        let polly = Arc::new(PollySynthesizer::new(PollyConfig::from_settings(settings)));
        *slot = Some((fingerprint, Arc::clone(&polly)));
        polly
    }
}

impl ProviderFactory for SettingsProviders {
    fn provider(&self, kind: ProviderKind, settings: &Settings) -> Arc<dyn SpeechSynthesizer> {
        match kind {
            ProviderKind::Polly => self.polly(settings),
            ProviderKind::Neural => {
                Arc::new(NeuralSynthesizer::new(NeuralConfig::from_settings(settings)))
            }
            ProviderKind::Local => {
                Arc::new(LocalSynthesizer::new(LocalConfig::from_settings(settings)))
            }
        }
    }
}

/// Fixed providers regardless of settings
pub struct StaticProviders {
    providers: HashMap<ProviderKind, Arc<dyn SpeechSynthesizer>>,
}

impl StaticProviders {
    pub fn new(providers: impl IntoIterator<Item = Arc<dyn SpeechSynthesizer>>) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.kind(), p)).collect(),
        }
    }
}

impl ProviderFactory for StaticProviders {
    fn provider(&self, kind: ProviderKind, _settings: &Settings) -> Arc<dyn SpeechSynthesizer> {
        match self.providers.get(&kind) {
            Some(provider) => Arc::clone(provider),
            None => Arc::new(crate::stub::StubSynthesizer::new(kind).unavailable()),
        }
    }
}

pub struct SpeechService {
    cache: AudioCache,
    providers: Arc<dyn ProviderFactory>,
}

impl SpeechService {
    pub fn new(cache: AudioCache, providers: Arc<dyn ProviderFactory>) -> Self {
        Self { cache, providers }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            AudioCache::from_settings(settings),
            Arc::new(SettingsProviders::new()),
        )
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    /// Audio URL for `text`, or `None` when TTS is off or every provider failed
    pub async fn speak(&self, text: &str, settings: &Settings) -> Option<String> {
        if !settings.enable_tts {
            return None;
        }
        if text.trim().is_empty() {
            return None;
        }

        for kind in provider_chain(settings.tts_provider, &settings.tts_fallback) {
            let provider = self.providers.provider(kind, settings);
            if !provider.is_available() {
                tracing::debug!(provider = %kind, "Provider not configured, skipping");
                continue;
            }

            let request = provider.prepare(base_request(kind, text, settings)).await;
            if kind == ProviderKind::Polly && request.voice.is_empty() {
                tracing::warn!("POLLY_VOICE_ID is empty, skipping Polly");
                continue;
            }

            match self.cache.get_or_synthesize(provider.as_ref(), &request).await {
                Ok(clip) => {
                    self.cache.record_play(&clip.key).await;
                    return Some(clip.url);
                }
                Err(e) => {
                    metrics::counter!("landing_tts_failures_total", "provider" => kind.as_str())
                        .increment(1);
                    tracing::warn!(provider = %kind, error = %e, "Speech synthesis failed, trying next provider");
                }
            }
        }

        tracing::warn!("No speech provider produced audio");
        None
    }

    pub async fn voices(&self, kind: ProviderKind, settings: &Settings) -> Result<Vec<VoiceInfo>> {
        self.providers.provider(kind, settings).list_voices().await
    }

    /// Warning text when the configured Polly voice is missing from the region
    pub async fn polly_voice_warning(&self, settings: &Settings) -> Option<String> {
        let polly = self.providers.provider(ProviderKind::Polly, settings);
        if !polly.is_available() {
            return None;
        }
        let catalog = match polly.list_voices().await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::debug!(error = %e, "Cannot verify Polly voice");
                return None;
            }
        };
        let voice = crate::polly::sanitize_voice_id(&settings.polly_voice_id, &catalog);
        if catalog.iter().any(|v| v.id == voice) {
            None
        } else {
            Some(format!(
                "voice {:?} is not available in {}",
                settings.polly_voice_id, settings.aws_region
            ))
        }
    }

    pub async fn clear_cache(&self) -> ClearReport {
        self.cache.clear().await
    }
}

/// Primary first, then fallbacks in order, without repeats
pub fn provider_chain(primary: ProviderKind, fallback: &[ProviderKind]) -> Vec<ProviderKind> {
    let mut chain = vec![primary];
    for kind in fallback {
        if !chain.contains(kind) {
            chain.push(*kind);
        }
    }
    chain
}

/// Request as configured, before provider-specific resolution
fn base_request(kind: ProviderKind, text: &str, settings: &Settings) -> SynthesisRequest {
    let (voice, format, region) = match kind {
        ProviderKind::Polly => (
            settings.polly_voice_id.clone(),
            settings.polly_output_format.clone(),
            settings.aws_region.clone(),
        ),
        ProviderKind::Neural => (settings.neural_voice_id.clone(), "mp3".to_string(), String::new()),
        ProviderKind::Local => (settings.local_voice.clone(), "wav".to_string(), "local".to_string()),
    };
    SynthesisRequest {
        provider: kind,
        text: text.to_string(),
        voice,
        engine: String::new(),
        format,
        region,
    }
}
