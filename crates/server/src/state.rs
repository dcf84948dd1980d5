//! Shared application state

use landing_judge_config::{QuoteCatalog, Settings, SettingsLoader};
use landing_judge_tts::SpeechService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ApiError;
use crate::hub::EventHub;

#[derive(Clone)]
pub struct AppState {
    pub loader: SettingsLoader,
    pub speech: Arc<SpeechService>,
    pub hub: EventHub,
    pub metrics: Option<PrometheusHandle>,
    /// Served under `/static`; fixed for the life of the process
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        loader: SettingsLoader,
        speech: SpeechService,
        static_dir: impl Into<PathBuf>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            loader,
            speech: Arc::new(speech),
            hub: EventHub::default(),
            metrics,
            static_dir: static_dir.into(),
        }
    }

    /// Settings as currently on disk
    pub async fn settings(&self) -> Result<Settings, ApiError> {
        let loader = self.loader.clone();
        blocking(move || Ok(loader.load()?)).await
    }

    pub fn quotes(&self, settings: &Settings) -> QuoteCatalog {
        QuoteCatalog::from_settings(settings)
    }
}

/// Run file I/O on the blocking pool
pub async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("file task failed: {e}")))?
}
