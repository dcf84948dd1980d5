//! Centralized defaults for the landing judge
//!
//! Single source of truth for default setting values, limits and file
//! locations used across the crates.

/// Network defaults
pub mod server {
    pub const DEFAULT_HOST: &str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 5005;

    /// Broadcast channel depth per subscriber before old events are dropped
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;

    /// Interval between SSE keep-alive comments (seconds)
    pub const KEEP_ALIVE_SECS: u64 = 60;
}

/// Overlay display defaults
pub mod overlay {
    /// How long the banner stays up (ms)
    pub const BANNER_DURATION_MS: u64 = 8000;

    /// Minimum time the banner lingers after audio ends (ms)
    pub const BANNER_MIN_LINGER_MS: u64 = 2000;

    pub const MAX_HUE_DEG: u16 = 360;
}

/// Audio effect defaults
pub mod effects {
    pub const STATIC_NOISE_LEVEL: f64 = 0.02;
    pub const RADIO_NOISE_LEVEL: f64 = 0.03;
    pub const WIND_NOISE_LEVEL: f64 = 0.03;
}

/// Text-to-speech defaults
pub mod tts {
    pub const DEFAULT_PROVIDER: &str = "polly";
    pub const DEFAULT_FALLBACK: &str = "local";

    pub const AWS_REGION: &str = "us-east-1";
    pub const POLLY_VOICE_ID: &str = "Joanna";
    pub const POLLY_OUTPUT_FORMAT: &str = "mp3";

    pub const NEURAL_ENDPOINT: &str = "https://api.elevenlabs.io";
    pub const NEURAL_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
    pub const NEURAL_MODEL_ID: &str = "eleven_multilingual_v2";

    /// Provider request timeout (ms)
    pub const REQUEST_TIMEOUT_MS: u64 = 15_000;
}

/// File locations, relative to the working directory
pub mod paths {
    pub const SETTINGS_FILE: &str = ".env";
    pub const STATIC_DIR: &str = "static";
    pub const AUDIO_SUBDIR: &str = "audio";
    pub const AUDIO_INDEX_FILE: &str = "audio_index.json";
    pub const QUOTES_FILE: &str = "quotes.json";
    pub const DEFAULT_QUOTES_FILE: &str = "quotes.default.json";
}

/// Quote selection
pub mod quotes {
    /// Spoken when a score has no quotes at all
    pub const FALLBACK_QUOTE: &str = "Well, that happened.";
}
