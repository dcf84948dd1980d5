//! Operating system speech engine
//!
//! Windows uses `System.Speech` through PowerShell; other platforms shell
//! out to `espeak-ng`. Both write a WAV file which is read back.

use async_trait::async_trait;
use landing_judge_config::Settings;
use landing_judge_core::{
    ProviderKind, Result, SpeechSynthesizer, SynthesisRequest, SynthesizedAudio, TtsError,
    VoiceInfo,
};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;

pub const ENGINE_SYSTEM: &str = "system";

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Empty selects the system default voice
    pub voice: String,
    /// Where intermediate WAV files are written
    pub scratch_dir: PathBuf,
}

impl LocalConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            voice: settings.local_voice.clone(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

pub struct LocalSynthesizer {
    config: LocalConfig,
}

impl LocalSynthesizer {
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }

    /// Unique per call, so identical requests in flight never share a file
    fn scratch_path(&self, request: &SynthesisRequest) -> PathBuf {
        self.config.scratch_dir.join(format!(
            "landing-judge-{}-{}-{}.wav",
            std::process::id(),
            request.cache_key(),
            SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }
}

#[async_trait]
impl SpeechSynthesizer for LocalSynthesizer {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn prepare(&self, request: SynthesisRequest) -> SynthesisRequest {
        SynthesisRequest {
            voice: if request.voice.is_empty() {
                self.config.voice.clone()
            } else {
                request.voice
            },
            engine: ENGINE_SYSTEM.to_string(),
            format: "wav".to_string(),
            region: "local".to_string(),
            ..request
        }
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        let path = self.scratch_path(request);
        let output = speak_command(&request.text, &request.voice, &path)
            .output()
            .await
            .map_err(|e| TtsError::Process(format!("failed to start speech engine: {e}")))?;
        check_status(&output)?;

        let bytes = tokio::fs::read(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!(path = %path.display(), error = %e, "Failed to remove scratch file");
        }
        let bytes = bytes?;
        if bytes.is_empty() {
            return Err(TtsError::Process("speech engine wrote an empty file".to_string()));
        }

        Ok(SynthesizedAudio {
            bytes,
            extension: "wav".to_string(),
            engine: ENGINE_SYSTEM.to_string(),
        })
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        let output = voices_command()
            .output()
            .await
            .map_err(|e| TtsError::Process(format!("failed to start speech engine: {e}")))?;
        check_status(&output)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if cfg!(windows) {
            Ok(parse_windows_voices(&stdout))
        } else {
            Ok(parse_espeak_voices(&stdout))
        }
    }
}

fn check_status(output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(TtsError::Process(format!(
        "speech engine exited with {}: {}",
        output.status,
        stderr.trim()
    )))
}

#[cfg(windows)]
fn speak_command(text: &str, voice: &str, path: &Path) -> Command {
    let mut script = String::from(
        "Add-Type -AssemblyName System.Speech; \
         $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; ",
    );
    if !voice.is_empty() {
        script.push_str(&format!("$s.SelectVoice({}); ", ps_quote(voice)));
    }
    script.push_str(&format!(
        "$s.SetOutputToWaveFile({}); $s.Speak({}); $s.Dispose()",
        ps_quote(&path.display().to_string()),
        ps_quote(text)
    ));
    powershell(&script)
}

#[cfg(not(windows))]
fn speak_command(text: &str, voice: &str, path: &Path) -> Command {
    let mut cmd = Command::new("espeak-ng");
    if !voice.is_empty() {
        cmd.arg("-v").arg(voice);
    }
    cmd.arg("-w").arg(path).arg("--").arg(text);
    cmd
}

#[cfg(windows)]
fn voices_command() -> Command {
    powershell(
        "Add-Type -AssemblyName System.Speech; \
         $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
         $s.GetInstalledVoices() | ForEach-Object { $i = $_.VoiceInfo; \
         \"$($i.Name)`t$($i.Culture.Name)`t$($i.Culture.DisplayName)\" }",
    )
}

#[cfg(not(windows))]
fn voices_command() -> Command {
    let mut cmd = Command::new("espeak-ng");
    cmd.arg("--voices");
    cmd
}

#[cfg(windows)]
fn powershell(script: &str) -> Command {
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-NonInteractive", "-Command", script]);
    cmd
}

/// Single-quoted PowerShell literal
#[cfg_attr(not(windows), allow(dead_code))]
fn ps_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// `Name<TAB>culture<TAB>display name` per line
fn parse_windows_voices(stdout: &str) -> Vec<VoiceInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.trim().split('\t');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(system_voice(
                name,
                parts.next().unwrap_or_default().trim(),
                parts.next().unwrap_or_default().trim(),
            ))
        })
        .collect()
}

/// `espeak-ng --voices` table: `Pty Language Age/Gender VoiceName File Other`
fn parse_espeak_voices(stdout: &str) -> Vec<VoiceInfo> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let language = cols[1];
            let mut voice = system_voice(language, language, cols[3]);
            voice.name = cols[3].replace('_', " ");
            Some(voice)
        })
        .collect()
}

fn system_voice(id: &str, language_code: &str, language_name: &str) -> VoiceInfo {
    VoiceInfo {
        id: id.to_string(),
        name: id.to_string(),
        language_code: language_code.to_string(),
        language_name: language_name.to_string(),
        engines: vec![ENGINE_SYSTEM.to_string()],
        provider: ProviderKind::Local,
    }
}
