//! Quote catalog
//!
//! Three layers, later wins per score:
//! 1. Built-in table compiled into the binary
//! 2. Bundled defaults file (`quotes.default.json`)
//! 3. Operator's file (`quotes.json`)
//!
//! Files are re-read on every lookup so edits apply to the next vote.

use landing_judge_core::Score;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::quotes::FALLBACK_QUOTE;
use crate::{write_atomic, ConfigError, Settings};

/// On-disk quotes document, keyed by score as a string ("1".."10")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteDocument {
    #[serde(default)]
    pub quotes: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

impl QuoteDocument {
    /// Table used when no defaults file ships alongside the binary
    pub fn builtin() -> Self {
        let quotes: [(u8, &[&str]); 10] = [
            (1, &["Well, that was... educational.", "Physics called. They want an explanation."]),
            (2, &["Hard arrival. Teeth still rattling."]),
            (3, &["Firm. The landing gear filed a complaint."]),
            (4, &["Not bad, not smooth. We felt it."]),
            (5, &["Acceptable. Coffee only trembled."]),
            (6, &["Decent touch. Cabin crew kept pouring."]),
            (7, &["Nice! Most passengers missed it."]),
            (8, &["Smooth operator. Butter adjacent."]),
            (9, &["Greased it. Polite applause engaged."]),
            (10, &["Absolute butter.", "Chief pilot approved!"]),
        ];
        let messages: [(u8, &str); 10] = [
            (1, "Mayday? That was… educational."),
            (2, "Hard arrival. Teeth still rattling."),
            (3, "Firm. The landing gear filed a complaint."),
            (4, "Not bad, not smooth. We felt it."),
            (5, "Acceptable. Coffee only trembled."),
            (6, "Decent touch. Cabin crew kept pouring."),
            (7, "Nice! Most passengers missed it."),
            (8, "Smooth operator. Butter adjacent."),
            (9, "Greased it. Polite applause engaged."),
            (10, "Absolute butter. Chief pilot approved!"),
        ];

        Self {
            quotes: quotes
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            messages: messages
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Overlay a loosely-typed document on top of this one
    ///
    /// A list replaces the score's quotes; any other value keeps the current
    /// list. Messages accept strings and scalars.
    fn merge_value(&mut self, value: &Value) {
        if let Some(quotes) = value.get("quotes").and_then(Value::as_object) {
            for (key, entry) in quotes {
                if let Some(list) = entry.as_array() {
                    let lines = list
                        .iter()
                        .filter_map(|v| match v {
                            Value::String(s) => Some(s.clone()),
                            Value::Null => None,
                            other => Some(other.to_string()),
                        })
                        .collect();
                    self.quotes.insert(key.trim().to_string(), lines);
                }
            }
        }
        if let Some(messages) = value.get("messages").and_then(Value::as_object) {
            for (key, entry) in messages {
                let text = match entry {
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                self.messages.insert(key.trim().to_string(), text);
            }
        }
    }

    pub fn quotes_for(&self, score: Score) -> &[String] {
        self.quotes
            .get(&score.to_string())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn message_for(&self, score: Score) -> &str {
        self.messages
            .get(&score.to_string())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// File-backed quote lookup
#[derive(Debug, Clone)]
pub struct QuoteCatalog {
    user_path: PathBuf,
    defaults_path: PathBuf,
}

impl QuoteCatalog {
    pub fn new(user_path: impl Into<PathBuf>, defaults_path: impl Into<PathBuf>) -> Self {
        Self {
            user_path: user_path.into(),
            defaults_path: defaults_path.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.quotes_file, &settings.default_quotes_file)
    }

    pub fn user_path(&self) -> &Path {
        &self.user_path
    }

    /// Built-in table overlaid with the bundled defaults file
    pub fn defaults(&self) -> QuoteDocument {
        let mut doc = QuoteDocument::builtin();
        if let Some(value) = read_json(&self.defaults_path) {
            doc.merge_value(&value);
        }
        doc
    }

    /// Fully merged document
    pub fn load(&self) -> QuoteDocument {
        let mut doc = self.defaults();
        if let Some(value) = read_json(&self.user_path) {
            doc.merge_value(&value);
        }
        doc
    }

    /// Uniformly random quote for the score
    pub fn random_quote(&self, score: Score) -> String {
        let doc = self.load();
        doc.quotes_for(score)
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_QUOTE.to_string())
    }

    pub fn message(&self, score: Score) -> String {
        self.load().message_for(score).to_string()
    }

    /// Validate and persist an operator-edited document
    ///
    /// Missing `quotes` or `messages` sections are filled from the defaults.
    pub fn save_document(&self, value: Value) -> Result<QuoteDocument, ConfigError> {
        let Value::Object(mut object) = value else {
            return Err(ConfigError::InvalidQuotes(
                "top-level JSON must be an object".to_string(),
            ));
        };

        let defaults = self.defaults();
        if !object.contains_key("quotes") {
            object.insert("quotes".to_string(), serde_json::to_value(&defaults.quotes)?);
        }
        if !object.contains_key("messages") {
            object.insert("messages".to_string(), serde_json::to_value(&defaults.messages)?);
        }
        for section in ["quotes", "messages"] {
            if !object.get(section).is_some_and(Value::is_object) {
                return Err(ConfigError::InvalidQuotes(format!(
                    "`{section}` must be an object keyed by score"
                )));
            }
        }

        let value = Value::Object(object);
        let pretty = serde_json::to_string_pretty(&value)?;
        write_atomic(&self.user_path, pretty.as_bytes())?;
        tracing::info!(path = %self.user_path.display(), "Quotes saved");

        Ok(self.load())
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read quotes file");
            return None;
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "Quotes file is not a JSON object, ignoring");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Quotes file is not valid JSON, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn catalog(dir: &TempDir) -> QuoteCatalog {
        QuoteCatalog::new(
            dir.path().join("quotes.json"),
            dir.path().join("quotes.default.json"),
        )
    }

    fn score(n: i64) -> Score {
        Score::clamped(n)
    }

    #[test]
    fn test_builtin_covers_every_score() {
        let doc = QuoteDocument::builtin();
        for s in Score::all() {
            assert!(!doc.quotes_for(s).is_empty());
            assert!(!doc.message_for(s).is_empty());
        }
    }

    #[test]
    fn test_missing_files_use_builtin() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);
        assert_eq!(catalog.message(score(10)), "Absolute butter. Chief pilot approved!");
        let quote = catalog.random_quote(score(10));
        assert!(["Absolute butter.", "Chief pilot approved!"].contains(&quote.as_str()));
    }

    #[test]
    fn test_user_overrides_per_score() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("quotes.json"),
            json!({
                "quotes": { "5": ["Five alive."], "6": "not a list" },
                "messages": { "5": "Halfway there." }
            })
            .to_string(),
        )
        .unwrap();
        let catalog = catalog(&dir);

        assert_eq!(catalog.random_quote(score(5)), "Five alive.");
        assert_eq!(catalog.random_quote(score(6)), "Decent touch. Cabin crew kept pouring.");
        assert_eq!(catalog.message(score(5)), "Halfway there.");
        assert_eq!(catalog.message(score(4)), "Not bad, not smooth. We felt it.");
    }

    #[test]
    fn test_defaults_file_layer() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("quotes.default.json"),
            json!({ "quotes": { "3": ["Bundled three."] } }).to_string(),
        )
        .unwrap();
        assert_eq!(catalog(&dir).random_quote(score(3)), "Bundled three.");
    }

    #[test]
    fn test_empty_list_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("quotes.json"),
            json!({ "quotes": { "2": [] } }).to_string(),
        )
        .unwrap();
        assert_eq!(catalog(&dir).random_quote(score(2)), FALLBACK_QUOTE);
    }

    #[test]
    fn test_corrupt_user_file_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("quotes.json"), "{ nope").unwrap();
        assert_eq!(catalog(&dir).random_quote(score(7)), "Nice! Most passengers missed it.");
    }

    #[test]
    fn test_save_document_fills_sections() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);
        let doc = catalog
            .save_document(json!({ "quotes": { "1": ["Ouch."] } }))
            .unwrap();
        assert_eq!(doc.quotes_for(score(1)), ["Ouch.".to_string()]);
        assert_eq!(doc.message_for(score(9)), "Greased it. Polite applause engaged.");

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(catalog.user_path()).unwrap()).unwrap();
        assert!(written["messages"].is_object());
    }

    #[test]
    fn test_save_document_rejects_non_objects() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);
        assert!(matches!(
            catalog.save_document(json!(["a"])),
            Err(ConfigError::InvalidQuotes(_))
        ));
        assert!(matches!(
            catalog.save_document(json!({ "quotes": [] })),
            Err(ConfigError::InvalidQuotes(_))
        ));
        assert!(!catalog.user_path().exists());
    }
}
