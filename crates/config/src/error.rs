use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings key {0:?}")]
    InvalidKey(String),

    #[error("settings layering failed: {0}")]
    Layering(#[from] config::ConfigError),

    #[error("invalid quotes document: {0}")]
    InvalidQuotes(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
