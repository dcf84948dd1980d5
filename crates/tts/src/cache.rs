//! Content-addressed audio cache
//!
//! Clips live in `static/audio/` next to `audio_index.json`, which maps a
//! request's cache key to the file that satisfies it. Entries written by
//! older versions may point at files directly under `static/`; those are
//! still served.

use chrono::Utc;
use landing_judge_config::constants::paths;
use landing_judge_config::{write_atomic, Settings};
use landing_judge_core::{
    utc_timestamp, Result, SpeechSynthesizer, SynthesisRequest, SynthesizedAudio,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File extensions removed by `clear`
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "pcm"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEntry {
    pub text: String,
    pub voice: String,
    pub engine: String,
    pub format: String,
    pub region: String,
    #[serde(default)]
    pub provider: String,
    pub filename: String,
    #[serde(default)]
    pub created_ts: String,
    #[serde(default)]
    pub play_count: u64,
}

pub type AudioIndex = BTreeMap<String, AudioEntry>;

/// A clip ready to be served
#[derive(Debug, Clone, PartialEq)]
pub struct CachedClip {
    pub key: String,
    pub url: String,
    /// Served from the cache without calling the provider
    pub hit: bool,
}

/// Outcome of `AudioCache::clear`
#[derive(Debug, Default)]
pub struct ClearReport {
    pub deleted: usize,
    pub errors: Vec<String>,
}

pub struct AudioCache {
    static_dir: PathBuf,
    audio_dir: PathBuf,
    index_path: PathBuf,
    /// Serializes read-modify-write of the index
    index_lock: Mutex<()>,
}

impl AudioCache {
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        let static_dir = static_dir.into();
        let audio_dir = static_dir.join(paths::AUDIO_SUBDIR);
        let index_path = audio_dir.join(paths::AUDIO_INDEX_FILE);
        Self {
            static_dir,
            audio_dir,
            index_path,
            index_lock: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.static_dir)
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Current index; missing or corrupt reads as empty
    pub async fn index(&self) -> AudioIndex {
        let content = match tokio::fs::read_to_string(&self.index_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AudioIndex::new(),
            Err(e) => {
                tracing::warn!(path = %self.index_path.display(), error = %e, "Failed to read audio index");
                return AudioIndex::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %self.index_path.display(), error = %e, "Audio index is corrupt, starting empty");
            AudioIndex::new()
        })
    }

    /// URL of a cached clip whose file still exists
    pub async fn lookup(&self, key: &str) -> Option<String> {
        let entry = self.index().await.remove(key)?;
        if entry.filename.is_empty() {
            return None;
        }
        if self.audio_dir.join(&entry.filename).is_file() {
            return Some(format!("/static/{}/{}", paths::AUDIO_SUBDIR, entry.filename));
        }
        if self.static_dir.join(&entry.filename).is_file() {
            return Some(format!("/static/{}", entry.filename));
        }
        None
    }

    /// Serve from cache, or synthesize and record the clip
    pub async fn get_or_synthesize(
        &self,
        synthesizer: &dyn SpeechSynthesizer,
        request: &SynthesisRequest,
    ) -> Result<CachedClip> {
        let key = request.cache_key();
        if let Some(url) = self.lookup(&key).await {
            metrics::counter!("landing_tts_cache_hits_total").increment(1);
            tracing::debug!(key = %key, url = %url, "Audio cache hit");
            return Ok(CachedClip { key, url, hit: true });
        }

        metrics::counter!("landing_tts_cache_misses_total").increment(1);
        let audio = synthesizer.synthesize(request).await?;
        self.store(request, &audio).await
    }

    /// Write the clip and index it under the engine actually used
    pub async fn store(
        &self,
        request: &SynthesisRequest,
        audio: &SynthesizedAudio,
    ) -> Result<CachedClip> {
        let used = if audio.engine.is_empty() || audio.engine == request.engine {
            request.clone()
        } else {
            request.with_engine(audio.engine.clone())
        };
        let key = used.cache_key();
        let filename = used.file_name(&audio.extension);

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        tokio::fs::write(self.audio_dir.join(&filename), &audio.bytes).await?;

        let entry = AudioEntry {
            text: used.text.clone(),
            voice: used.voice.clone(),
            engine: used.engine.clone(),
            format: used.format.clone(),
            region: used.region.clone(),
            provider: used.provider.to_string(),
            filename: filename.clone(),
            created_ts: utc_timestamp(Utc::now()),
            play_count: 0,
        };
        let write = self
            .update_index(|index| {
                index.insert(key.clone(), entry);
                true
            })
            .await;
        if let Err(e) = write {
            tracing::warn!(error = %e, "Failed to update audio index");
        }

        tracing::info!(key = %key, file = %filename, provider = %used.provider, "Cached new clip");
        Ok(CachedClip {
            key,
            url: format!("/static/{}/{}", paths::AUDIO_SUBDIR, filename),
            hit: false,
        })
    }

    /// Bump the play counter; false when the key is not indexed
    pub async fn record_play(&self, key: &str) -> bool {
        let result = self
            .update_index(|index| match index.get_mut(key) {
                Some(entry) => {
                    entry.play_count += 1;
                    true
                }
                None => false,
            })
            .await;
        match result {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to record play");
                false
            }
        }
    }

    /// Delete every clip and the index
    pub async fn clear(&self) -> ClearReport {
        let _guard = self.index_lock.lock().await;
        let mut report = ClearReport::default();

        let mut dir = match tokio::fs::read_dir(&self.audio_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                report.errors.push(format!("{}: {e}", self.audio_dir.display()));
                return report;
            }
        };

        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    report.errors.push(e.to_string());
                    break;
                }
            };
            let path = entry.path();
            let is_audio = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if !is_audio {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.deleted += 1,
                Err(e) => report.errors.push(format!("{}: {e}", path.display())),
            }
        }

        match tokio::fs::remove_file(&self.index_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => report.errors.push(format!("{}: {e}", self.index_path.display())),
        }

        tracing::info!(deleted = report.deleted, errors = report.errors.len(), "Audio cache cleared");
        report
    }

    /// Apply `change` under the index lock; written only when it returns true
    async fn update_index<F>(&self, change: F) -> std::result::Result<bool, String>
    where
        F: FnOnce(&mut AudioIndex) -> bool,
    {
        let _guard = self.index_lock.lock().await;
        let mut index = self.index().await;
        if !change(&mut index) {
            return Ok(false);
        }
        let json = serde_json::to_string_pretty(&index).map_err(|e| e.to_string())?;
        write_atomic(&self.index_path, json.as_bytes()).map_err(|e| e.to_string())?;
        Ok(true)
    }
}
