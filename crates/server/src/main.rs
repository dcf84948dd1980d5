//! Landing judge entry point

use anyhow::Context;
use clap::Parser;
use landing_judge_config::SettingsLoader;
use landing_judge_core::ProviderKind;
use landing_judge_server::cli::{Cli, Command};
use landing_judge_server::client::{format_event, ControlClient};
use landing_judge_server::{router, telemetry, AppState};
use landing_judge_tts::SpeechService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_logging(cli.debug, cli.log_json)?;

    let loader = SettingsLoader::new(&cli.settings);
    match cli.command.unwrap_or(Command::Serve {
        port: None,
        host: None,
    }) {
        Command::Serve { port, host } => serve(loader, port, host).await,
        command => run_client(&loader, command).await,
    }
}

async fn serve(loader: SettingsLoader, port: Option<u16>, host: Option<String>) -> anyhow::Result<()> {
    let mut settings = loader
        .load()
        .with_context(|| format!("loading settings from {}", loader.file().path().display()))?;
    if let Some(port) = port {
        settings.port = port;
    }
    if let Some(host) = host {
        settings.host = host;
    }

    let metrics = telemetry::init_metrics();
    let audio_dir = settings.audio_dir();
    tokio::fs::create_dir_all(&audio_dir)
        .await
        .with_context(|| format!("creating {}", audio_dir.display()))?;

    let speech = SpeechService::from_settings(&settings);
    if settings.tts_provider == ProviderKind::Polly {
        if let Some(warning) = speech.polly_voice_warning(&settings).await {
            tracing::warn!(warning = %warning, "Polly voice check");
        }
    }

    let static_dir = settings.static_dir.clone();
    let state = AppState::new(loader, speech, &static_dir, metrics);
    let app = router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        addr = %addr,
        static_dir = %static_dir.display(),
        provider = %settings.tts_provider,
        "Overlay at http://{}/overlay",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn run_client(loader: &SettingsLoader, command: Command) -> anyhow::Result<()> {
    let base = match command.url() {
        Some(url) => url.to_string(),
        None => loader.load()?.base_url(),
    };
    let client = ControlClient::new(&base);

    let response = match command {
        Command::Vote { score, .. } => client.vote(score).await?,
        Command::Preview { off, score, .. } => client.preview(!off, score).await?,
        Command::Theme { deg, .. } => client.theme(deg).await?,
        Command::ClearCache { .. } => client.clear_cache().await?,
        Command::Watch { .. } => {
            tokio::select! {
                _ = client.watch(|event| println!("{}", format_event(event))) => {}
                _ = shutdown_signal() => {}
            }
            return Ok(());
        }
        Command::Serve { .. } => return Ok(()),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
