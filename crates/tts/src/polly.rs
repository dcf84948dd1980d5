//! Amazon Polly over its REST API
//!
//! Voices are resolved against the region's catalog before synthesis: the
//! engine is `neural` when the voice supports it, and a rejected request is
//! retried once with the other engine.

use async_trait::async_trait;
use chrono::Utc;
use landing_judge_config::Settings;
use landing_judge_core::{
    ProviderKind, Result, SpeechSynthesizer, SynthesisRequest, SynthesizedAudio, TtsError,
    VoiceInfo,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::time::Duration;

use crate::sigv4::{self, Credentials, SigningRequest};

pub const ENGINE_NEURAL: &str = "neural";
pub const ENGINE_STANDARD: &str = "standard";

const SERVICE: &str = "polly";

#[derive(Debug, Clone)]
pub struct PollyConfig {
    pub credentials: Credentials,
    pub region: String,
    /// Overrides `https://polly.{region}.amazonaws.com`
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl PollyConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            credentials: Credentials {
                access_key_id: settings.aws_access_key_id.clone(),
                secret_access_key: settings.aws_secret_access_key.clone(),
                session_token: Some(settings.aws_session_token.clone()).filter(|t| !t.is_empty()),
            },
            region: settings.aws_region.clone(),
            endpoint: None,
            timeout: Duration::from_millis(
                landing_judge_config::constants::tts::REQUEST_TIMEOUT_MS,
            ),
        }
    }

    fn base_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://polly.{}.amazonaws.com", self.region))
    }
}

pub struct PollySynthesizer {
    config: PollyConfig,
    client: reqwest::Client,
    /// Voice catalog for `config.region`, fetched once
    catalog: Mutex<Option<Vec<VoiceInfo>>>,
}

impl PollySynthesizer {
    pub fn new(config: PollyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            catalog: Mutex::new(None),
        }
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Region catalog, cached after the first successful fetch
    pub async fn catalog(&self) -> Result<Vec<VoiceInfo>> {
        let cached = self.catalog.lock().clone();
        if let Some(voices) = cached {
            return Ok(voices);
        }
        let voices = self.describe_voices().await?;
        *self.catalog.lock() = Some(voices.clone());
        Ok(voices)
    }

    async fn describe_voices(&self) -> Result<Vec<VoiceInfo>> {
        let mut voices = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(token) = next_token.as_deref() {
                query.push(("NextToken", token));
            }
            let body = self.send("GET", "/v1/voices", &query, Vec::new()).await?;
            let page: DescribeVoicesResponse = serde_json::from_slice(&body)
                .map_err(|e| TtsError::InvalidResponse(format!("voices: {e}")))?;

            voices.extend(page.voices.into_iter().map(|v| VoiceInfo {
                name: v.name.unwrap_or_else(|| v.id.clone()),
                id: v.id,
                language_code: v.language_code.unwrap_or_default(),
                language_name: v.language_name.unwrap_or_default(),
                engines: v.supported_engines,
                provider: ProviderKind::Polly,
            }));

            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        voices.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::debug!(region = %self.config.region, count = voices.len(), "Fetched Polly voices");
        Ok(voices)
    }

    async fn synthesize_once(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(&SynthesizeSpeechBody {
            engine: &request.engine,
            output_format: &request.format,
            text: &request.text,
            text_type: "text",
            voice_id: &request.voice,
        })
        .map_err(|e| TtsError::InvalidResponse(e.to_string()))?;
        self.send("POST", "/v1/speech", &[], body).await
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let base = self.config.base_url();
        let host = base
            .split("://")
            .nth(1)
            .unwrap_or(&base)
            .trim_end_matches('/')
            .to_string();
        let headers = sigv4::sign(
            &SigningRequest {
                method,
                host: &host,
                path,
                query,
                payload: &body,
                region: &self.config.region,
                service: SERVICE,
            },
            &self.config.credentials,
            Utc::now(),
        )?;

        let mut url = format!("{}{path}", base.trim_end_matches('/'));
        if !query.is_empty() {
            url.push('?');
            url.push_str(&sigv4::canonical_query(query));
        }

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| TtsError::Http(e.to_string()))?;
        let mut builder = self.client.request(method, &url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if !body.is_empty() {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TtsError::Http(format!("polly: {e}")))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TtsError::Http(format!("polly: {e}")))?;

        if status.is_client_error() {
            return Err(TtsError::Rejected {
                provider: "polly",
                status: status.as_u16(),
                message: error_message(&bytes),
            });
        }
        if !status.is_success() {
            return Err(TtsError::Http(format!(
                "polly returned {status}: {}",
                error_message(&bytes)
            )));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for PollySynthesizer {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Polly
    }

    fn is_available(&self) -> bool {
        !self.config.credentials.access_key_id.is_empty()
            && !self.config.credentials.secret_access_key.is_empty()
    }

    async fn prepare(&self, request: SynthesisRequest) -> SynthesisRequest {
        let catalog = match self.catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(error = %e, "Polly voice catalog unavailable, using voice as given");
                Vec::new()
            }
        };
        let voice = sanitize_voice_id(&request.voice, &catalog);
        let engine = pick_engine(&voice, &catalog).to_string();
        SynthesisRequest {
            voice,
            engine,
            region: self.config.region.clone(),
            ..request
        }
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        if !self.is_available() {
            return Err(TtsError::not_configured("polly", "AWS credentials missing"));
        }

        let (bytes, engine) = match self.synthesize_once(request).await {
            Ok(bytes) => (bytes, request.engine.clone()),
            Err(e) if e.is_rejection() => {
                let alternate = alternate_engine(&request.engine);
                tracing::info!(
                    voice = %request.voice,
                    engine = %request.engine,
                    alternate,
                    error = %e,
                    "Polly rejected engine, retrying"
                );
                let bytes = self.synthesize_once(&request.with_engine(alternate)).await?;
                (bytes, alternate.to_string())
            }
            Err(e) => return Err(e),
        };

        if bytes.is_empty() {
            return Err(TtsError::InvalidResponse("polly returned no audio".to_string()));
        }
        Ok(SynthesizedAudio {
            bytes,
            extension: extension_for_format(&request.format).to_string(),
            engine,
        })
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        self.catalog().await
    }
}

/// Resolve a configured voice (possibly a rich UI label) to a catalog id
///
/// Exact id, else a catalog id contained in the label, else the longest
/// purely alphabetic token of the label.
pub fn sanitize_voice_id(raw: &str, catalog: &[VoiceInfo]) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    if catalog.iter().any(|v| v.id == s) {
        return s.to_string();
    }
    if let Some(voice) = catalog
        .iter()
        .filter(|v| !v.id.is_empty() && s.contains(v.id.as_str()))
        .max_by_key(|v| v.id.len())
    {
        return voice.id.clone();
    }

    let mut best: Option<&str> = None;
    for token in s.split(|c: char| c.is_whitespace() || c == '•' || c == '·') {
        if token.is_empty() || !token.chars().all(char::is_alphabetic) {
            continue;
        }
        if best.map_or(true, |b| token.chars().count() > b.chars().count()) {
            best = Some(token);
        }
    }
    best.unwrap_or(s).to_string()
}

/// `neural` when the catalog says the voice supports it
///
/// With no catalog the engine is unknown; `neural` is tried first and the
/// rejection retry covers standard-only voices.
pub fn pick_engine(voice: &str, catalog: &[VoiceInfo]) -> &'static str {
    if catalog.is_empty() {
        return ENGINE_NEURAL;
    }
    let supports_neural = catalog
        .iter()
        .find(|v| v.id == voice)
        .is_some_and(|v| v.engines.iter().any(|e| e == ENGINE_NEURAL));
    if supports_neural {
        ENGINE_NEURAL
    } else {
        ENGINE_STANDARD
    }
}

pub fn alternate_engine(engine: &str) -> &'static str {
    if engine == ENGINE_NEURAL {
        ENGINE_STANDARD
    } else {
        ENGINE_NEURAL
    }
}

pub fn extension_for_format(format: &str) -> &str {
    match format {
        "ogg_vorbis" => "ogg",
        "pcm" => "pcm",
        "mp3" => "mp3",
        other => other,
    }
}

fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "Message")]
        message: Option<String>,
    }
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).chars().take(200).collect())
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct SynthesizeSpeechBody<'a> {
    engine: &'a str,
    output_format: &'a str,
    text: &'a str,
    text_type: &'a str,
    voice_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVoicesResponse {
    #[serde(default)]
    voices: Vec<PollyVoice>,
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PollyVoice {
    id: String,
    name: Option<String>,
    language_code: Option<String>,
    language_name: Option<String>,
    #[serde(default)]
    supported_engines: Vec<String>,
}
