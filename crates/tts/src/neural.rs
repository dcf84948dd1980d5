//! Neural voice web service (ElevenLabs-compatible API)

use async_trait::async_trait;
use landing_judge_config::Settings;
use landing_judge_core::{
    ProviderKind, Result, SpeechSynthesizer, SynthesisRequest, SynthesizedAudio, TtsError,
    VoiceInfo,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NeuralConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model_id: String,
    pub timeout: Duration,
}

impl NeuralConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_key: settings.neural_api_key.clone(),
            endpoint: settings.neural_endpoint.trim_end_matches('/').to_string(),
            model_id: settings.neural_model_id.clone(),
            timeout: Duration::from_millis(
                landing_judge_config::constants::tts::REQUEST_TIMEOUT_MS,
            ),
        }
    }

    /// Host part of the endpoint, used as the cache "region"
    pub fn host(&self) -> &str {
        let without_scheme = self
            .endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.endpoint);
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }
}

pub struct NeuralSynthesizer {
    config: NeuralConfig,
    client: reqwest::Client,
}

impl NeuralSynthesizer {
    pub fn new(config: NeuralConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    async fn check(response: reqwest::Response) -> Result<Vec<u8>> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TtsError::Http(format!("neural: {e}")))?;
        if status.is_client_error() {
            return Err(TtsError::Rejected {
                provider: "neural",
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).chars().take(200).collect(),
            });
        }
        if !status.is_success() {
            return Err(TtsError::Http(format!("neural service returned {status}")));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for NeuralSynthesizer {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Neural
    }

    fn is_available(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn prepare(&self, request: SynthesisRequest) -> SynthesisRequest {
        SynthesisRequest {
            engine: self.config.model_id.clone(),
            format: "mp3".to_string(),
            region: self.config.host().to_string(),
            ..request
        }
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        if !self.is_available() {
            return Err(TtsError::not_configured("neural", "NEURAL_API_KEY missing"));
        }
        let url = format!("{}/v1/text-to-speech/{}", self.config.endpoint, request.voice);
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&SpeechBody {
                text: &request.text,
                model_id: &request.engine,
            })
            .send()
            .await
            .map_err(|e| TtsError::Http(format!("neural: {e}")))?;

        let bytes = Self::check(response).await?;
        if bytes.is_empty() {
            return Err(TtsError::InvalidResponse("neural service returned no audio".to_string()));
        }
        Ok(SynthesizedAudio {
            bytes,
            extension: "mp3".to_string(),
            engine: request.engine.clone(),
        })
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        if !self.is_available() {
            return Err(TtsError::not_configured("neural", "NEURAL_API_KEY missing"));
        }
        let response = self
            .client
            .get(format!("{}/v1/voices", self.config.endpoint))
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| TtsError::Http(format!("neural: {e}")))?;
        let body = Self::check(response).await?;
        let parsed: VoicesResponse = serde_json::from_slice(&body)
            .map_err(|e| TtsError::InvalidResponse(format!("voices: {e}")))?;
        Ok(parsed
            .voices
            .into_iter()
            .map(|v| v.into_info(&self.config.model_id))
            .collect())
    }
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<NeuralVoice>,
}

#[derive(Deserialize)]
struct NeuralVoice {
    voice_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

impl NeuralVoice {
    fn into_info(self, model_id: &str) -> VoiceInfo {
        let language = |key: &str| self.labels.get(key).cloned().unwrap_or_default();
        VoiceInfo {
            language_code: language("language"),
            language_name: language("accent"),
            name: if self.name.is_empty() {
                self.voice_id.clone()
            } else {
                self.name.clone()
            },
            id: self.voice_id,
            engines: vec![model_id.to_string()],
            provider: ProviderKind::Neural,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_host_extraction() {
        let config = NeuralConfig::from_settings(&Settings::default());
        assert_eq!(config.host(), "api.elevenlabs.io");

        let config = NeuralConfig {
            endpoint: "http://127.0.0.1:9000/tts".to_string(),
            ..config
        };
        assert_eq!(config.host(), "127.0.0.1:9000");
    }

    #[test]
    fn test_voices_response_parses() {
        let json = r#"{"voices":[
            {"voice_id":"abc","name":"Rachel","labels":{"accent":"american","language":"en"}},
            {"voice_id":"def"}
        ]}"#;
        let parsed: VoicesResponse = serde_json::from_str(json).unwrap();
        let infos: Vec<VoiceInfo> = parsed
            .voices
            .into_iter()
            .map(|v| v.into_info("eleven_multilingual_v2"))
            .collect();
        assert_eq!(infos[0].name, "Rachel");
        assert_eq!(infos[0].language_name, "american");
        assert_eq!(infos[1].name, "def");
        assert_eq!(infos[1].engines, vec!["eleven_multilingual_v2".to_string()]);
    }

    #[tokio::test]
    async fn test_prepare_uses_model_and_host() {
        let neural = NeuralSynthesizer::new(NeuralConfig::from_settings(&Settings::default()));
        assert!(!neural.is_available());
        let request = neural
            .prepare(SynthesisRequest {
                provider: ProviderKind::Neural,
                text: "Nice!".to_string(),
                voice: "21m00Tcm4TlvDq8ikWAM".to_string(),
                engine: String::new(),
                format: String::new(),
                region: String::new(),
            })
            .await;
        assert_eq!(request.engine, "eleven_multilingual_v2");
        assert_eq!(request.format, "mp3");
        assert_eq!(request.region, "api.elevenlabs.io");
    }

    /// Local stand-in for the voice service; voice `blocked` is refused
    async fn fake_service() -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&bodies);
        let app = axum::Router::new().route(
            "/v1/text-to-speech/:voice",
            axum::routing::post(
                move |axum::extract::Path(voice): axum::extract::Path<String>,
                      headers: axum::http::HeaderMap,
                      axum::Json(body): axum::Json<serde_json::Value>| {
                    let seen = Arc::clone(&seen);
                    async move {
                        let key = headers
                            .get("xi-api-key")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        seen.lock().push(body);
                        if key != "key-123" || voice == "blocked" {
                            (axum::http::StatusCode::UNAUTHORIZED, "voice not allowed".to_string())
                        } else {
                            (axum::http::StatusCode::OK, "MP3".to_string())
                        }
                    }
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), bodies)
    }

    fn neural_at(base: &str) -> NeuralSynthesizer {
        NeuralSynthesizer::new(NeuralConfig {
            api_key: "key-123".to_string(),
            endpoint: base.to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            timeout: Duration::from_secs(5),
        })
    }

    fn request_for(voice: &str) -> SynthesisRequest {
        SynthesisRequest {
            provider: ProviderKind::Neural,
            text: "Greased it.".to_string(),
            voice: voice.to_string(),
            engine: "eleven_multilingual_v2".to_string(),
            format: "mp3".to_string(),
            region: "127.0.0.1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_synthesize_sends_key_and_body() {
        let (base, bodies) = fake_service().await;
        let audio = neural_at(&base).synthesize(&request_for("rachel")).await.unwrap();

        assert_eq!(audio.bytes, b"MP3");
        assert_eq!(audio.engine, "eleven_multilingual_v2");
        assert_eq!(
            bodies.lock()[0],
            serde_json::json!({ "text": "Greased it.", "model_id": "eleven_multilingual_v2" })
        );
    }

    #[tokio::test]
    async fn test_client_error_is_rejection() {
        let (base, _) = fake_service().await;
        let err = neural_at(&base)
            .synthesize(&request_for("blocked"))
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert!(matches!(err, TtsError::Rejected { status: 401, .. }));
    }
}
