//! Speech synthesis errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtsError {
    /// Provider is missing credentials or another required setting
    #[error("{provider} is not configured: {reason}")]
    NotConfigured {
        provider: &'static str,
        reason: String,
    },

    /// Provider refused the request (4xx); the caller may retry with other parameters
    #[error("{provider} rejected the request ({status}): {message}")]
    Rejected {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("speech process failed: {0}")]
    Process(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TtsError {
    pub fn not_configured(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::NotConfigured {
            provider,
            reason: reason.into(),
        }
    }

    /// True when retrying with a different engine might succeed
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
