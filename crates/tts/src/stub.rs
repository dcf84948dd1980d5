//! In-memory synthesizer for tests and offline runs

use async_trait::async_trait;
use landing_judge_core::{
    ProviderKind, Result, SpeechSynthesizer, SynthesisRequest, SynthesizedAudio, TtsError,
    VoiceInfo,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns a few fixed bytes per request and counts calls
pub struct StubSynthesizer {
    kind: ProviderKind,
    available: bool,
    fail: bool,
    engine_override: Option<String>,
    calls: AtomicUsize,
}

impl StubSynthesizer {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            available: true,
            fail: false,
            engine_override: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every synthesis attempt errors
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Report a different engine than requested, like a Polly engine retry
    pub fn with_engine_override(mut self, engine: &str) -> Self {
        self.engine_override = Some(engine.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TtsError::Http(format!("{} stub failure", self.kind)));
        }
        let extension = match self.kind {
            ProviderKind::Local => "wav",
            _ => "mp3",
        };
        Ok(SynthesizedAudio {
            bytes: format!("stub:{}", request.text).into_bytes(),
            extension: extension.to_string(),
            engine: self
                .engine_override
                .clone()
                .unwrap_or_else(|| request.engine.clone()),
        })
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        Ok(vec![VoiceInfo {
            id: "Stub".to_string(),
            name: "Stub voice".to_string(),
            language_code: "en-US".to_string(),
            language_name: "US English".to_string(),
            engines: vec!["standard".to_string()],
            provider: self.kind,
        }])
    }
}
