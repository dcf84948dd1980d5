//! Typed, layered settings
//!
//! Layers, lowest to highest:
//! 1. Built-in defaults (`constants`)
//! 2. Process environment, known keys only
//! 3. The key=value settings file
//!
//! The file wins so values saved through the control API take effect on
//! the next load without a restart.

use config::{Config, Environment, Source, Value};
use landing_judge_core::{EffectPreset, Effects, ProviderKind, SettingsEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::constants::{effects, overlay, paths, server, tts};
use crate::{ConfigError, EnvFile};

/// Every key the settings file may carry
pub const SETTINGS_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "BANNER_DURATION_MS",
    "BANNER_MIN_LINGER_MS",
    "HIDE_ON_AUDIO_END",
    "OVERLAY_HUE_DEG",
    "ENABLE_TTS",
    "ENABLE_DINGDONG",
    "ADD_STATIC_NOISE",
    "EFFECT_PRESET",
    "STATIC_NOISE_LEVEL",
    "RADIO_NOISE_LEVEL",
    "WIND_NOISE_LEVEL",
    "TTS_PROVIDER",
    "TTS_FALLBACK",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_REGION",
    "POLLY_VOICE_ID",
    "POLLY_OUTPUT_FORMAT",
    "NEURAL_API_KEY",
    "NEURAL_ENDPOINT",
    "NEURAL_VOICE_ID",
    "NEURAL_MODEL_ID",
    "LOCAL_VOICE",
    "STATIC_DIR",
    "QUOTES_FILE",
    "DEFAULT_QUOTES_FILE",
];

const SECRET_KEYS: &[&str] = &["AWS_SECRET_ACCESS_KEY", "AWS_SESSION_TOKEN", "NEURAL_API_KEY"];

const REDACTED: &str = "********";

/// Resolved settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub banner_duration_ms: u64,
    pub banner_min_linger_ms: u64,
    pub hide_on_audio_end: bool,
    pub overlay_hue_deg: u16,
    pub enable_tts: bool,
    pub enable_dingdong: bool,
    pub add_static_noise: bool,
    pub effect_preset: EffectPreset,
    pub static_noise_level: f64,
    pub radio_noise_level: f64,
    pub wind_noise_level: f64,
    pub tts_provider: ProviderKind,
    pub tts_fallback: Vec<ProviderKind>,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_session_token: String,
    pub aws_region: String,
    pub polly_voice_id: String,
    pub polly_output_format: String,
    pub neural_api_key: String,
    pub neural_endpoint: String,
    pub neural_voice_id: String,
    pub neural_model_id: String,
    pub local_voice: String,
    pub static_dir: PathBuf,
    pub quotes_file: PathBuf,
    pub default_quotes_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_raw(RawSettings::default())
    }
}

impl Settings {
    /// Effects block for overlay events
    pub fn effects(&self) -> Effects {
        Effects::new(
            self.add_static_noise,
            self.effect_preset,
            self.static_noise_level,
            self.radio_noise_level,
            self.wind_noise_level,
        )
    }

    pub fn settings_event(&self) -> SettingsEvent {
        SettingsEvent {
            enable_tts: self.enable_tts,
            enable_dingdong: self.enable_dingdong,
            hide_on_audio_end: self.hide_on_audio_end,
            duration_ms: self.banner_duration_ms,
            min_linger_ms: self.banner_min_linger_ms,
            effects: self.effects(),
        }
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.static_dir.join(paths::AUDIO_SUBDIR)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn polly_configured(&self) -> bool {
        !self.aws_access_key_id.is_empty() && !self.aws_secret_access_key.is_empty()
    }

    /// Defaults, keeping bind host and file locations
    pub fn reset_defaults(&self) -> Settings {
        Settings {
            host: self.host.clone(),
            static_dir: self.static_dir.clone(),
            quotes_file: self.quotes_file.clone(),
            default_quotes_file: self.default_quotes_file.clone(),
            ..Settings::default()
        }
    }

    /// Copy safe to hand to API clients
    pub fn redacted(&self) -> Settings {
        let mask = |s: &str| {
            if s.is_empty() {
                String::new()
            } else {
                REDACTED.to_string()
            }
        };
        Settings {
            aws_secret_access_key: mask(&self.aws_secret_access_key),
            aws_session_token: mask(&self.aws_session_token),
            neural_api_key: mask(&self.neural_api_key),
            ..self.clone()
        }
    }

    /// Every persisted key rendered back to its file form
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let fallback = self
            .tts_fallback
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",");
        vec![
            ("HOST", self.host.clone()),
            ("PORT", self.port.to_string()),
            ("BANNER_DURATION_MS", self.banner_duration_ms.to_string()),
            ("BANNER_MIN_LINGER_MS", self.banner_min_linger_ms.to_string()),
            ("HIDE_ON_AUDIO_END", self.hide_on_audio_end.to_string()),
            ("OVERLAY_HUE_DEG", self.overlay_hue_deg.to_string()),
            ("ENABLE_TTS", self.enable_tts.to_string()),
            ("ENABLE_DINGDONG", self.enable_dingdong.to_string()),
            ("ADD_STATIC_NOISE", self.add_static_noise.to_string()),
            ("EFFECT_PRESET", self.effect_preset.to_string()),
            ("STATIC_NOISE_LEVEL", format!("{:.3}", self.static_noise_level)),
            ("RADIO_NOISE_LEVEL", format!("{:.3}", self.radio_noise_level)),
            ("WIND_NOISE_LEVEL", format!("{:.3}", self.wind_noise_level)),
            ("TTS_PROVIDER", self.tts_provider.to_string()),
            ("TTS_FALLBACK", fallback),
            ("AWS_ACCESS_KEY_ID", self.aws_access_key_id.clone()),
            ("AWS_SECRET_ACCESS_KEY", self.aws_secret_access_key.clone()),
            ("AWS_SESSION_TOKEN", self.aws_session_token.clone()),
            ("AWS_REGION", self.aws_region.clone()),
            ("POLLY_VOICE_ID", self.polly_voice_id.clone()),
            ("POLLY_OUTPUT_FORMAT", self.polly_output_format.clone()),
            ("NEURAL_API_KEY", self.neural_api_key.clone()),
            ("NEURAL_ENDPOINT", self.neural_endpoint.clone()),
            ("NEURAL_VOICE_ID", self.neural_voice_id.clone()),
            ("NEURAL_MODEL_ID", self.neural_model_id.clone()),
            ("LOCAL_VOICE", self.local_voice.clone()),
            ("STATIC_DIR", self.static_dir.display().to_string()),
            ("QUOTES_FILE", self.quotes_file.display().to_string()),
            ("DEFAULT_QUOTES_FILE", self.default_quotes_file.display().to_string()),
        ]
    }

    fn from_raw(raw: RawSettings) -> Self {
        let preset = raw
            .effect_preset
            .as_deref()
            .map(EffectPreset::parse)
            .unwrap_or_default();
        let tts_provider = raw
            .tts_provider
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| match ProviderKind::from_str(s) {
                Ok(kind) => Some(kind),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring TTS_PROVIDER");
                    None
                }
            })
            .unwrap_or(ProviderKind::Polly);
        let hue: i64 = number("OVERLAY_HUE_DEG", raw.overlay_hue_deg.as_deref(), 0);

        Self {
            host: text(raw.host, server::DEFAULT_HOST),
            port: number("PORT", raw.port.as_deref(), server::DEFAULT_PORT),
            banner_duration_ms: number(
                "BANNER_DURATION_MS",
                raw.banner_duration_ms.as_deref(),
                overlay::BANNER_DURATION_MS,
            ),
            banner_min_linger_ms: number(
                "BANNER_MIN_LINGER_MS",
                raw.banner_min_linger_ms.as_deref(),
                overlay::BANNER_MIN_LINGER_MS,
            ),
            hide_on_audio_end: flag(raw.hide_on_audio_end.as_deref(), true),
            overlay_hue_deg: hue.clamp(0, overlay::MAX_HUE_DEG as i64) as u16,
            enable_tts: flag(raw.enable_tts.as_deref(), true),
            enable_dingdong: flag(raw.enable_dingdong.as_deref(), false),
            add_static_noise: flag(raw.add_static_noise.as_deref(), false),
            effect_preset: preset,
            static_noise_level: level(
                "STATIC_NOISE_LEVEL",
                raw.static_noise_level.as_deref(),
                effects::STATIC_NOISE_LEVEL,
            ),
            radio_noise_level: level(
                "RADIO_NOISE_LEVEL",
                raw.radio_noise_level.as_deref(),
                effects::RADIO_NOISE_LEVEL,
            ),
            wind_noise_level: level(
                "WIND_NOISE_LEVEL",
                raw.wind_noise_level.as_deref(),
                effects::WIND_NOISE_LEVEL,
            ),
            tts_provider,
            tts_fallback: provider_list(raw.tts_fallback.as_deref().unwrap_or(tts::DEFAULT_FALLBACK)),
            aws_access_key_id: trimmed(raw.aws_access_key_id),
            aws_secret_access_key: trimmed(raw.aws_secret_access_key),
            aws_session_token: trimmed(raw.aws_session_token),
            aws_region: text(raw.aws_region, tts::AWS_REGION),
            polly_voice_id: text(raw.polly_voice_id, tts::POLLY_VOICE_ID),
            polly_output_format: text(raw.polly_output_format, tts::POLLY_OUTPUT_FORMAT),
            neural_api_key: trimmed(raw.neural_api_key),
            neural_endpoint: text(raw.neural_endpoint, tts::NEURAL_ENDPOINT),
            neural_voice_id: text(raw.neural_voice_id, tts::NEURAL_VOICE_ID),
            neural_model_id: text(raw.neural_model_id, tts::NEURAL_MODEL_ID),
            local_voice: trimmed(raw.local_voice),
            static_dir: text(raw.static_dir, paths::STATIC_DIR).into(),
            quotes_file: text(raw.quotes_file, paths::QUOTES_FILE).into(),
            default_quotes_file: text(raw.default_quotes_file, paths::DEFAULT_QUOTES_FILE).into(),
        }
    }
}

/// Raw string layer, as produced by the `config` crate
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    host: Option<String>,
    port: Option<String>,
    banner_duration_ms: Option<String>,
    banner_min_linger_ms: Option<String>,
    hide_on_audio_end: Option<String>,
    overlay_hue_deg: Option<String>,
    enable_tts: Option<String>,
    enable_dingdong: Option<String>,
    add_static_noise: Option<String>,
    effect_preset: Option<String>,
    static_noise_level: Option<String>,
    radio_noise_level: Option<String>,
    wind_noise_level: Option<String>,
    tts_provider: Option<String>,
    tts_fallback: Option<String>,
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<String>,
    aws_session_token: Option<String>,
    aws_region: Option<String>,
    polly_voice_id: Option<String>,
    polly_output_format: Option<String>,
    neural_api_key: Option<String>,
    neural_endpoint: Option<String>,
    neural_voice_id: Option<String>,
    neural_model_id: Option<String>,
    local_voice: Option<String>,
    static_dir: Option<String>,
    quotes_file: Option<String>,
    default_quotes_file: Option<String>,
}

/// `config` source backed by the settings file
#[derive(Debug, Clone)]
struct FileLayer {
    origin: String,
    entries: Vec<(String, String)>,
}

impl Source for FileLayer {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<config::Map<String, Value>, config::ConfigError> {
        Ok(self
            .entries
            .iter()
            .filter(|(k, _)| SETTINGS_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.to_lowercase(), Value::new(Some(&self.origin), v.clone())))
            .collect())
    }
}

/// Loads and persists `Settings` through one settings file
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    file: Arc<EnvFile>,
    environment: EnvironmentLayer,
}

/// Where the environment layer comes from
#[derive(Debug, Clone)]
enum EnvironmentLayer {
    Process,
    Fixed(Arc<BTreeMap<String, String>>),
    Disabled,
}

impl SettingsLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Arc::new(EnvFile::new(path)),
            environment: EnvironmentLayer::Process,
        }
    }

    /// Ignore the process environment (tests, explicit files)
    pub fn without_environment(mut self) -> Self {
        self.environment = EnvironmentLayer::Disabled;
        self
    }

    /// Use `vars` in place of the process environment
    pub fn with_environment<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.environment = EnvironmentLayer::Fixed(Arc::new(vars));
        self
    }

    pub fn file(&self) -> &EnvFile {
        &self.file
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();

        let vars: Option<Vec<(String, String)>> = match &self.environment {
            EnvironmentLayer::Process => Some(std::env::vars().collect()),
            EnvironmentLayer::Fixed(vars) => {
                Some(vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            EnvironmentLayer::Disabled => None,
        };
        if let Some(vars) = vars {
            let env: config::Map<String, String> = vars
                .into_iter()
                .filter(|(k, _)| SETTINGS_KEYS.contains(&k.as_str()))
                .collect();
            builder = builder.add_source(Environment::default().source(Some(env)));
        }

        builder = builder.add_source(FileLayer {
            origin: self.file.path().display().to_string(),
            entries: self.file.entries()?,
        });

        let raw: RawSettings = builder.build()?.try_deserialize()?;
        Ok(Settings::from_raw(raw))
    }

    /// Write every key of `settings` to the file
    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        self.file.set_many(settings.to_pairs())?;
        tracing::debug!(path = %self.file.path().display(), "Settings saved");
        Ok(())
    }

    /// Persist a partial update and return the resulting settings
    pub fn apply(&self, update: &SettingsUpdate) -> Result<Settings, ConfigError> {
        let mut pairs = update.to_pairs()?;

        // a processing preset and static-only noise are mutually exclusive
        let preset = pairs
            .iter()
            .find(|(k, _)| k == "EFFECT_PRESET")
            .map(|(_, v)| EffectPreset::parse(v));
        let static_on = pairs
            .iter()
            .find(|(k, _)| k == "ADD_STATIC_NOISE")
            .map(|(_, v)| flag(Some(v), false));
        match (preset, static_on) {
            (Some(p), _) if p != EffectPreset::None => {
                pairs.retain(|(k, _)| k != "ADD_STATIC_NOISE");
                pairs.push(("ADD_STATIC_NOISE".to_string(), "false".to_string()));
            }
            (None, Some(true)) => pairs.push(("EFFECT_PRESET".to_string(), "none".to_string())),
            _ => {}
        }

        if !pairs.is_empty() {
            self.file.set_many(pairs)?;
        }
        self.load()
    }

    /// Restore defaults and persist them
    pub fn reset_defaults(&self) -> Result<Settings, ConfigError> {
        let current = self.load()?;
        let defaults = current.reset_defaults();
        self.save(&defaults)?;
        self.load()
    }
}

/// Partial settings update, keyed by setting name
///
/// Keys are case-insensitive; values may be JSON strings, numbers or bools.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SettingsUpdate(pub BTreeMap<String, serde_json::Value>);

impl SettingsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validate keys and render values in file form
    pub fn to_pairs(&self) -> Result<Vec<(String, String)>, ConfigError> {
        self.0
            .iter()
            .map(|(key, value)| {
                let key = key.trim().to_ascii_uppercase();
                if !SETTINGS_KEYS.contains(&key.as_str()) {
                    return Err(ConfigError::InvalidKey(key));
                }
                let rendered = match value {
                    serde_json::Value::String(s) => s.trim().to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Null => String::new(),
                    serde_json::Value::Array(items) => items
                        .iter()
                        .map(|item| match item {
                            serde_json::Value::String(s) => s.trim().to_string(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    other => other.to_string(),
                };
                // never echo a redacted placeholder back into the file
                if SECRET_KEYS.contains(&key.as_str()) && rendered == REDACTED {
                    return Ok(None);
                }
                Ok(Some((key, rendered)))
            })
            .filter_map(Result::transpose)
            .collect()
    }
}

fn flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
    }
}

fn number<T>(key: &str, raw: Option<&str>, default: T) -> T
where
    T: FromStr + Copy,
{
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = v, "Unparseable number, using default");
            default
        }),
    }
}

fn level(key: &str, raw: Option<&str>, default: f64) -> f64 {
    landing_judge_core::effects::normalize_level(number(key, raw, default))
}

fn text(raw: Option<String>, default: &str) -> String {
    match raw.map(|s| s.trim().to_string()) {
        Some(s) if !s.is_empty() => s,
        _ => default.to_string(),
    }
}

fn trimmed(raw: Option<String>) -> String {
    raw.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn provider_list(raw: &str) -> Vec<ProviderKind> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.eq_ignore_ascii_case("none") {
            continue;
        }
        match ProviderKind::from_str(part) {
            Ok(kind) if !out.contains(&kind) => out.push(kind),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring TTS_FALLBACK entry"),
        }
    }
    out
}
