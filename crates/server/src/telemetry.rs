//! Logging and metrics setup

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

const OWN_TARGETS: &[&str] = &[
    "landing_judge",
    "landing_judge_server",
    "landing_judge_tts",
    "landing_judge_config",
];

/// Filter for the subscriber
///
/// `--debug` wins outright. Otherwise a non-empty `RUST_LOG` is used as is,
/// and the built-in `info` directives apply only when it is unset or invalid.
pub fn log_filter(debug: bool, rust_log: Option<&str>) -> EnvFilter {
    if debug {
        return EnvFilter::new(default_directives("debug"));
    }
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|e| {
            eprintln!("ignoring invalid {}: {e}", EnvFilter::DEFAULT_ENV);
            EnvFilter::new(default_directives("info"))
        }),
        None => EnvFilter::new(default_directives("info")),
    }
}

fn default_directives(level: &str) -> String {
    let mut directives: Vec<String> = OWN_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    directives.push("tower_http=info".to_string());
    directives.push("hyper=warn".to_string());
    directives.push("warn".to_string());
    directives.join(",")
}

/// Install the global subscriber
pub fn init_logging(debug: bool, json: bool) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let builder = tracing_subscriber::fmt().with_env_filter(log_filter(debug, rust_log.as_deref()));
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

/// Prometheus recorder for `/metrics`; `None` when one is already installed
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics exporter unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_rust_log_is_respected() {
        let filter = log_filter(false, Some("landing_judge_tts=trace"));
        let rendered = filter.to_string();
        assert!(rendered.contains("landing_judge_tts=trace"));
        assert!(!rendered.contains("landing_judge_tts=info"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_defaults_when_unset() {
        for rust_log in [None, Some(""), Some("   ")] {
            let rendered = log_filter(false, rust_log).to_string();
            assert!(rendered.contains("landing_judge_server=info"));
        }
    }

    #[test]
    fn test_debug_overrides_rust_log() {
        let filter = log_filter(true, Some("landing_judge_tts=error"));
        let rendered = filter.to_string();
        assert!(rendered.contains("landing_judge_tts=debug"));
        assert!(!rendered.contains("=error"));
    }
}
