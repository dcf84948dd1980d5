//! HTTP API
//!
//! Endpoints:
//! - `GET /`, `GET /overlay`: overlay page
//! - `GET /stream`: server-sent overlay events
//! - `GET /vote/:score`: rate a landing
//! - `POST /theme`, `POST /preview`: overlay look and preview mode
//! - `GET|PUT /settings`, `POST /settings/reset`
//! - `GET|PUT /quotes`
//! - `GET /voices?provider=`
//! - `DELETE /cache`
//! - `GET /health`, `GET /metrics`
//! - `/static/*`: overlay assets and cached audio

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::StreamExt;
use landing_judge_config::constants;
use landing_judge_config::{QuoteDocument, Settings, SettingsUpdate};
use landing_judge_core::{
    utc_timestamp, EffectPreset, NoiseKind, OverlayEvent, ProviderKind, Score, VoiceInfo, VoteEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::num::IntErrorKind;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::overlay;
use crate::state::{blocking, AppState};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(overlay_page))
        .route("/overlay", get(overlay_page))
        .route("/stream", get(stream))
        .route("/vote/:score", get(vote))
        .route("/theme", post(theme))
        .route("/preview", post(preview))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/settings/reset", post(reset_settings))
        .route("/quotes", get(get_quotes).put(put_quotes))
        .route("/voices", get(voices))
        .route("/cache", delete(clear_cache))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn overlay_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let settings = state.settings().await?;
    Ok(Html(overlay::render(&settings)))
}

async fn stream(State(state): State<AppState>) -> impl IntoResponse {
    let events = state
        .hub
        .stream()
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));
    tracing::info!(subscribers = state.hub.subscriber_count(), "Overlay connected");

    let sse = Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(constants::server::KEEP_ALIVE_SECS))
            .text("keep-alive"),
    );
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
}

async fn vote(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<OverlayEvent>, ApiError> {
    let score = Score::clamped(parse_score(&raw)?);
    let settings = state.settings().await?;
    let quotes = state.quotes(&settings);
    let (quote, message) =
        blocking(move || Ok((quotes.random_quote(score), quotes.message(score)))).await?;

    let audio_url = state.speech.speak(&quote, &settings).await.unwrap_or_default();

    let level = score.level();
    let effects = settings.effects();
    metrics::counter!("landing_votes_total", "level" => level.as_str()).increment(1);
    tracing::info!(
        score = score.value(),
        level = %level,
        audio = !audio_url.is_empty(),
        preset = %effects.preset,
        noise = ?effects.noise_kind(),
        noise_level = effects.active_noise_level(),
        "Vote received"
    );

    let event = OverlayEvent::Vote(VoteEvent {
        enable_tts: settings.enable_tts,
        enable_dingdong: settings.enable_dingdong,
        score,
        message,
        quote,
        audio_url,
        level,
        duration_ms: settings.banner_duration_ms,
        effects,
        ts: utc_timestamp(Utc::now()),
    });
    state.hub.publish(event.clone());
    Ok(Json(event))
}

async fn theme(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let body = lenient_json(&body);
    let hue = int_field(&body, "hue_deg")
        .unwrap_or(0)
        .clamp(0, constants::overlay::MAX_HUE_DEG as i64) as u16;

    let loader = state.loader.clone();
    let persisted = blocking(move || {
        loader.file().set("OVERLAY_HUE_DEG", &hue.to_string())?;
        Ok(())
    })
    .await;
    if let Err(e) = persisted {
        tracing::warn!(error = %e, "Failed to persist overlay hue");
    }
    state.hub.publish(OverlayEvent::Theme { hue_deg: hue });
    Json(json!({ "ok": true, "hue_deg": hue }))
}

async fn preview(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let body = lenient_json(&body);
    let active = body.get("active").map(truthy).unwrap_or(false);
    let score = Score::clamped(int_field(&body, "score").unwrap_or(1));

    state.hub.publish(OverlayEvent::Preview { active, score });
    Json(json!({ "ok": true, "active": active, "score": score }))
}

/// Ambience preset as listed to settings editors
#[derive(Debug, Serialize)]
struct PresetInfo {
    id: EffectPreset,
    description: &'static str,
    noise: Option<NoiseKind>,
}

fn preset_catalog() -> Vec<PresetInfo> {
    EffectPreset::ALL
        .into_iter()
        .map(|id| PresetInfo {
            id,
            description: id.description(),
            noise: id.noise_bed(),
        })
        .collect()
}

#[derive(Serialize)]
struct SettingsResponse {
    #[serde(flatten)]
    settings: Settings,
    presets: Vec<PresetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl SettingsResponse {
    fn new(settings: &Settings, warning: Option<String>) -> Self {
        Self {
            settings: settings.redacted(),
            presets: preset_catalog(),
            warning,
        }
    }
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state.settings().await?;
    Ok(Json(SettingsResponse::new(&settings, None)))
}

async fn put_settings(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SettingsResponse>, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?;
    if !value.is_object() {
        return Err(ApiError::BadRequest("settings must be a JSON object".to_string()));
    }
    let update: SettingsUpdate = serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let keys = update.0.len();
    let hue_changed = update.0.keys().any(|k| k.eq_ignore_ascii_case("OVERLAY_HUE_DEG"));
    let loader = state.loader.clone();
    let settings = blocking(move || Ok(loader.apply(&update)?)).await?;
    tracing::info!(keys, "Settings updated");

    state.hub.publish(OverlayEvent::Settings(settings.settings_event()));
    if hue_changed {
        state.hub.publish(OverlayEvent::Theme {
            hue_deg: settings.overlay_hue_deg,
        });
    }

    let uses_polly = settings.tts_provider == ProviderKind::Polly
        || settings.tts_fallback.contains(&ProviderKind::Polly);
    let warning = if uses_polly {
        state.speech.polly_voice_warning(&settings).await
    } else {
        None
    };
    if let Some(w) = &warning {
        tracing::warn!(warning = %w, "Polly voice check");
    }

    Ok(Json(SettingsResponse::new(&settings, warning)))
}

async fn reset_settings(State(state): State<AppState>) -> Result<Json<SettingsResponse>, ApiError> {
    let loader = state.loader.clone();
    let settings = blocking(move || Ok(loader.reset_defaults()?)).await?;
    tracing::info!("Settings reset to defaults");
    state.hub.publish(OverlayEvent::Settings(settings.settings_event()));
    state.hub.publish(OverlayEvent::Theme {
        hue_deg: settings.overlay_hue_deg,
    });
    Ok(Json(SettingsResponse::new(&settings, None)))
}

async fn get_quotes(State(state): State<AppState>) -> Result<Json<QuoteDocument>, ApiError> {
    let quotes = state.quotes(&state.settings().await?);
    Ok(Json(blocking(move || Ok(quotes.load())).await?))
}

async fn put_quotes(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<QuoteDocument>, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?;
    let quotes = state.quotes(&state.settings().await?);
    Ok(Json(blocking(move || Ok(quotes.save_document(value)?)).await?))
}

#[derive(Debug, Deserialize)]
struct VoicesQuery {
    provider: Option<String>,
}

#[derive(Serialize)]
struct VoicesResponse {
    provider: ProviderKind,
    voices: Vec<VoiceInfo>,
}

async fn voices(
    State(state): State<AppState>,
    Query(query): Query<VoicesQuery>,
) -> Result<Json<VoicesResponse>, ApiError> {
    let settings = state.settings().await?;
    let provider = match query.provider.as_deref().map(str::trim) {
        None | Some("") => settings.tts_provider,
        Some(raw) => raw.parse::<ProviderKind>().map_err(ApiError::BadRequest)?,
    };
    let voices = state.speech.voices(provider, &settings).await?;
    Ok(Json(VoicesResponse { provider, voices }))
}

async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let report = state.speech.clear_cache().await;
    for error in &report.errors {
        tracing::warn!(error = %error, "Failed to delete cached audio");
    }
    state.hub.publish(OverlayEvent::CacheCleared {
        deleted: report.deleted,
    });
    Json(json!({
        "ok": report.errors.is_empty(),
        "deleted": report.deleted,
        "errors": report.errors,
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "subscribers": state.hub.subscriber_count(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics_text(State(state): State<AppState>) -> Result<Response, ApiError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("metrics exporter not installed".to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response())
}

/// Integer path segment; out-of-range values saturate so they clamp later
fn parse_score(raw: &str) -> Result<i64, ApiError> {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(n) => Ok(n),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(ApiError::BadRequest(format!(
                "score must be an integer, got {raw:?}"
            ))),
        },
    }
}

/// Body as JSON, anything unparseable reads as `null`
fn lenient_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn int_field(body: &Value, key: &str) -> Option<i64> {
    match body.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use landing_judge_config::SettingsLoader;
    use landing_judge_core::SpeechSynthesizer;
    use landing_judge_tts::{AudioCache, SpeechService, StaticProviders, StubSynthesizer};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Harness {
        _dir: TempDir,
        state: AppState,
        env_path: std::path::PathBuf,
    }

    fn harness_with(providers: Vec<Arc<dyn SpeechSynthesizer>>, extra: &str) -> Harness {
        let dir = TempDir::new().unwrap();
        let static_dir = dir.path().join("static");
        std::fs::create_dir_all(&static_dir).unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(
            &env_path,
            format!(
                "STATIC_DIR={}\nQUOTES_FILE={}\nDEFAULT_QUOTES_FILE={}\nTTS_PROVIDER=polly\nTTS_FALLBACK=local\n{extra}",
                static_dir.display(),
                dir.path().join("quotes.json").display(),
                dir.path().join("quotes.default.json").display(),
            ),
        )
        .unwrap();

        let loader = SettingsLoader::new(&env_path).without_environment();
        let speech = SpeechService::new(
            AudioCache::new(&static_dir),
            Arc::new(StaticProviders::new(providers)),
        );
        let state = AppState::new(loader, speech, &static_dir, None);
        Harness {
            _dir: dir,
            state,
            env_path,
        }
    }

    fn harness() -> Harness {
        harness_with(vec![Arc::new(StubSynthesizer::new(ProviderKind::Polly))], "")
    }

    async fn send(h: &Harness, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router(h.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(h: &Harness, uri: &str) -> (StatusCode, Value) {
        send(h, Method::GET, uri, "").await
    }

    #[tokio::test]
    async fn test_vote_broadcasts_and_returns_payload() {
        let h = harness();
        let mut rx = h.state.hub.subscribe();

        let (status, json) = get(&h, "/vote/7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "vote");
        assert_eq!(json["score"], 7);
        assert_eq!(json["level"], "good");
        assert_eq!(json["message"], "Nice! Most passengers missed it.");
        assert_eq!(json["quote"], "Nice! Most passengers missed it.");
        assert!(json["audio_url"].as_str().unwrap().starts_with("/static/audio/"));
        assert_eq!(json["duration_ms"], 8000);

        match rx.try_recv().unwrap() {
            OverlayEvent::Vote(v) => assert_eq!(v.score.value(), 7),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_vote_clamps_and_rejects_non_integers() {
        let h = harness();
        assert_eq!(get(&h, "/vote/42").await.1["score"], 10);
        assert_eq!(get(&h, "/vote/-3").await.1["score"], 1);
        assert_eq!(get(&h, "/vote/99999999999999999999").await.1["score"], 10);

        let (status, json) = get(&h, "/vote/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("integer"));
    }

    #[tokio::test]
    async fn test_vote_without_tts_has_no_audio() {
        let h = harness_with(
            vec![Arc::new(StubSynthesizer::new(ProviderKind::Polly))],
            "ENABLE_TTS=false\nENABLE_DINGDONG=true\n",
        );
        let (_, json) = get(&h, "/vote/9").await;
        assert_eq!(json["audio_url"], "");
        assert_eq!(json["enable_tts"], false);
        assert_eq!(json["enable_dingdong"], true);
    }

    #[tokio::test]
    async fn test_vote_survives_failing_providers() {
        let h = harness_with(
            vec![
                Arc::new(StubSynthesizer::new(ProviderKind::Polly).failing()),
                Arc::new(StubSynthesizer::new(ProviderKind::Local).failing()),
            ],
            "",
        );
        let (status, json) = get(&h, "/vote/2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["audio_url"], "");
        assert_eq!(json["level"], "bad");
    }

    #[tokio::test]
    async fn test_cached_audio_is_served() {
        let h = harness();
        let (_, json) = get(&h, "/vote/10").await;
        let url = json["audio_url"].as_str().unwrap().to_string();

        let request = Request::builder().uri(&url).body(Body::empty()).unwrap();
        let response = router(h.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_theme_clamps_and_persists() {
        let h = harness();
        let mut rx = h.state.hub.subscribe();

        let (status, json) = send(&h, Method::POST, "/theme", r#"{"hue_deg": 400}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "ok": true, "hue_deg": 360 }));
        assert_eq!(rx.try_recv().unwrap(), OverlayEvent::Theme { hue_deg: 360 });
        assert!(std::fs::read_to_string(&h.env_path)
            .unwrap()
            .contains("OVERLAY_HUE_DEG=360"));

        let (_, json) = send(&h, Method::POST, "/theme", "not json").await;
        assert_eq!(json["hue_deg"], 0);
        let (_, json) = send(&h, Method::POST, "/theme", r#"{"hue_deg": "120"}"#).await;
        assert_eq!(json["hue_deg"], 120);
    }

    #[tokio::test]
    async fn test_preview_defaults_and_clamps() {
        let h = harness();
        let (_, json) = send(&h, Method::POST, "/preview", "{}").await;
        assert_eq!(json, json!({ "ok": true, "active": false, "score": 1 }));

        let mut rx = h.state.hub.subscribe();
        let (_, json) = send(&h, Method::POST, "/preview", r#"{"active": 1, "score": 12}"#).await;
        assert_eq!(json, json!({ "ok": true, "active": true, "score": 10 }));
        assert_eq!(
            rx.try_recv().unwrap(),
            OverlayEvent::Preview {
                active: true,
                score: Score::clamped(10)
            }
        );
    }

    #[tokio::test]
    async fn test_settings_get_redacts_secrets() {
        let h = harness_with(
            vec![Arc::new(StubSynthesizer::new(ProviderKind::Polly))],
            "AWS_SECRET_ACCESS_KEY=very-secret\n",
        );
        let (status, json) = get(&h, "/settings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["aws_secret_access_key"], "********");
        assert_eq!(json["port"], 5005);
        assert!(json.get("warning").is_none());
    }

    #[tokio::test]
    async fn test_settings_list_presets() {
        let h = harness();
        let (_, json) = get(&h, "/settings").await;
        let presets = json["presets"].as_array().unwrap();
        assert_eq!(presets.len(), EffectPreset::ALL.len());
        assert_eq!(presets[0], json!({
            "id": "none",
            "description": "No processing, clean direct audio.",
            "noise": null,
        }));
        let radio = presets.iter().find(|p| p["id"] == "atc_radio").unwrap();
        assert_eq!(radio["noise"], "radio");
        let apron = presets.iter().find(|p| p["id"] == "apron_outdoor").unwrap();
        assert_eq!(apron["noise"], "wind");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_file_backed_endpoints_on_single_thread_runtime() {
        let h = harness();
        assert_eq!(get(&h, "/settings").await.0, StatusCode::OK);
        assert_eq!(get(&h, "/quotes").await.0, StatusCode::OK);
        assert_eq!(get(&h, "/vote/6").await.0, StatusCode::OK);
        let (status, _) = send(&h, Method::PUT, "/settings", r#"{"ENABLE_DINGDONG": false}"#).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&h, Method::POST, "/theme", r#"{"hue_deg": 30}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(std::fs::read_to_string(&h.env_path)
            .unwrap()
            .contains("OVERLAY_HUE_DEG=30"));
    }

    #[tokio::test]
    async fn test_settings_put_applies_and_broadcasts() {
        let h = harness();
        let mut rx = h.state.hub.subscribe();

        let (status, json) = send(
            &h,
            Method::PUT,
            "/settings",
            r#"{"ENABLE_TTS": false, "effect_preset": "atc_radio", "OVERLAY_HUE_DEG": 90}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["enable_tts"], false);
        assert_eq!(json["effect_preset"], "atc_radio");
        assert!(json["warning"].as_str().unwrap().contains("Joanna"));

        match rx.try_recv().unwrap() {
            OverlayEvent::Settings(s) => {
                assert!(!s.enable_tts);
                assert_eq!(s.effects.preset.as_str(), "atc_radio");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(rx.try_recv().unwrap(), OverlayEvent::Theme { hue_deg: 90 });
    }

    #[tokio::test]
    async fn test_settings_put_rejects_bad_input() {
        let h = harness();
        let (status, _) = send(&h, Method::PUT, "/settings", r#"{"NOT_A_KEY": 1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&h, Method::PUT, "/settings", "[1, 2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_settings_reset_broadcasts_settings_and_theme() {
        let h = harness_with(
            vec![Arc::new(StubSynthesizer::new(ProviderKind::Polly))],
            "OVERLAY_HUE_DEG=200\nENABLE_TTS=false\n",
        );
        let mut rx = h.state.hub.subscribe();

        let (status, json) = send(&h, Method::POST, "/settings/reset", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["overlay_hue_deg"], 0);
        assert_eq!(json["enable_tts"], true);
        assert!(matches!(rx.try_recv().unwrap(), OverlayEvent::Settings(_)));
        assert_eq!(rx.try_recv().unwrap(), OverlayEvent::Theme { hue_deg: 0 });
    }

    #[tokio::test]
    async fn test_quotes_round_trip() {
        let h = harness();
        let (status, _) = send(&h, Method::PUT, "/quotes", r#"["nope"]"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &h,
            Method::PUT,
            "/quotes",
            r#"{"quotes": {"4": ["Four on the floor."]}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = get(&h, "/quotes").await;
        assert_eq!(json["quotes"]["4"], json!(["Four on the floor."]));
        assert_eq!(json["messages"]["4"], "Not bad, not smooth. We felt it.");

        let (_, vote) = get(&h, "/vote/4").await;
        assert_eq!(vote["quote"], "Four on the floor.");
    }

    #[tokio::test]
    async fn test_voices_by_provider() {
        let h = harness();
        let (status, json) = get(&h, "/voices").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["provider"], "polly");
        assert_eq!(json["voices"][0]["id"], "Stub");

        let (status, _) = get(&h, "/voices?provider=festival").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_clear_cache_reports_and_broadcasts() {
        let h = harness();
        get(&h, "/vote/5").await;
        let mut rx = h.state.hub.subscribe();

        let (status, json) = send(&h, Method::DELETE, "/cache", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["deleted"], 1);
        assert_eq!(json["ok"], true);
        assert_eq!(rx.try_recv().unwrap(), OverlayEvent::CacheCleared { deleted: 1 });
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let h = harness();
        let (status, json) = get(&h, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["subscribers"], 0);

        let (status, _) = get(&h, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_overlay_page_injects_hue() {
        let h = harness_with(
            vec![Arc::new(StubSynthesizer::new(ProviderKind::Polly))],
            "OVERLAY_HUE_DEG=123\n",
        );
        let request = Request::builder().uri("/overlay").body(Body::empty()).unwrap();
        let response = router(h.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("--hue: 123deg"));
    }

    #[tokio::test]
    async fn test_stream_sends_hello_first() {
        let h = harness();
        let request = Request::builder().uri("/stream").body(Body::empty()).unwrap();
        let response = router(h.state.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"data: {\"type\":\"hello\"}\n\n");

        h.state.hub.publish(OverlayEvent::CacheCleared { deleted: 2 });
        let next = body.next().await.unwrap().unwrap();
        assert_eq!(&next[..], b"data: {\"type\":\"cache_cleared\",\"deleted\":2}\n\n");
    }

    #[test]
    fn test_lenient_helpers() {
        let body = json!({ "a": 3.9, "b": "7", "c": true, "d": [] });
        assert_eq!(int_field(&body, "a"), Some(3));
        assert_eq!(int_field(&body, "b"), Some(7));
        assert_eq!(int_field(&body, "c"), Some(1));
        assert_eq!(int_field(&body, "d"), None);
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!(0)));
    }
}
