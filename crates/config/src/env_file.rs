//! Flat `KEY=VALUE` settings file
//!
//! The control API writes individual keys back into the file the operator
//! may also edit by hand, so writes keep comments, ordering and unrelated
//! lines intact.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{write_atomic, ConfigError};

/// Handle to a key=value settings file
#[derive(Debug)]
pub struct EnvFile {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in file order; a missing file is empty
    pub fn entries(&self) -> Result<Vec<(String, String)>, ConfigError> {
        Ok(self
            .read_lines()?
            .iter()
            .filter_map(|line| parse_line(line))
            .collect())
    }

    /// Entries as a map, later duplicates win
    pub fn to_map(&self) -> Result<HashMap<String, String>, ConfigError> {
        Ok(self.entries()?.into_iter().collect())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self
            .entries()?
            .into_iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_many([(key, value)])
    }

    /// Update several keys in one write
    pub fn set_many<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Result<(), ConfigError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        for (key, _) in &pairs {
            validate_key(key)?;
        }

        let _guard = self.write_lock.lock();
        let mut lines = self.read_lines()?;

        for (key, value) in &pairs {
            let rendered = render_line(key, value);
            match lines
                .iter()
                .position(|line| parse_line(line).is_some_and(|(k, _)| &k == key))
            {
                Some(idx) => {
                    lines[idx] = rendered;
                    // drop any later duplicates so the rewritten value wins
                    let mut i = idx + 1;
                    while i < lines.len() {
                        if parse_line(&lines[i]).is_some_and(|(k, _)| &k == key) {
                            lines.remove(i);
                        } else {
                            i += 1;
                        }
                    }
                }
                None => lines.push(rendered),
            }
        }

        self.write_lines(&lines)
    }

    /// Remove a key; absent keys are a no-op
    pub fn remove(&self, key: &str) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock();
        let mut lines = self.read_lines()?;
        let before = lines.len();
        lines.retain(|line| !parse_line(line).is_some_and(|(k, _)| k == key));
        if lines.len() == before {
            return Ok(());
        }
        self.write_lines(&lines)
    }

    fn read_lines(&self) -> Result<Vec<String>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(ConfigError::Read {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), ConfigError> {
        let mut content = lines.join("\n");
        content.push('\n');
        write_atomic(&self.path, content.as_bytes())
    }
}

/// Parse one line into `(key, value)`; comments and junk yield `None`
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, raw) = trimmed.split_once('=')?;
    let key = key.trim();
    if validate_key(key).is_err() {
        return None;
    }
    Some((key.to_string(), parse_value(raw.trim())))
}

fn parse_value(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return unescape(&raw[1..raw.len() - 1]);
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    // unquoted values may carry a trailing comment
    match raw.find(" #") {
        Some(idx) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn render_line(key: &str, value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\'));
    if !needs_quotes {
        return format!("{key}={value}");
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    format!("{key}=\"{escaped}\"")
}

fn validate_key(key: &str) -> Result<(), ConfigError> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_with(content: &str) -> (TempDir, EnvFile) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, content).unwrap();
        (dir, EnvFile::new(path))
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_line("PORT=5005"), Some(("PORT".into(), "5005".into())));
        assert_eq!(parse_line("export A = b"), Some(("A".into(), "b".into())));
        assert_eq!(parse_line("V='Emma • x'"), Some(("V".into(), "Emma • x".into())));
        assert_eq!(parse_line(r#"Q="say \"hi\"""#), Some(("Q".into(), "say \"hi\"".into())));
        assert_eq!(parse_line("X=1 # note"), Some(("X".into(), "1".into())));
        assert_eq!(parse_line("EMPTY="), Some(("EMPTY".into(), String::new())));
        assert_eq!(parse_line("# comment"), None);
        assert_eq!(parse_line("not a pair"), None);
        assert_eq!(parse_line("1BAD=x"), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = EnvFile::new(dir.path().join("absent.env"));
        assert!(file.entries().unwrap().is_empty());
        assert_eq!(file.get("PORT").unwrap(), None);
    }

    #[test]
    fn test_set_preserves_layout() {
        let (_dir, file) = file_with("# Landing judge\nPORT=5005\n\nAWS_REGION=us-east-1\n");
        file.set("AWS_REGION", "eu-west-2").unwrap();
        file.set("ENABLE_TTS", "false").unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(
            content,
            "# Landing judge\nPORT=5005\n\nAWS_REGION=eu-west-2\nENABLE_TTS=false\n"
        );
    }

    #[test]
    fn test_set_creates_file() {
        let dir = TempDir::new().unwrap();
        let file = EnvFile::new(dir.path().join(".env"));
        file.set("OVERLAY_HUE_DEG", "90").unwrap();
        assert_eq!(file.get("OVERLAY_HUE_DEG").unwrap().as_deref(), Some("90"));
    }

    #[test]
    fn test_quoted_values_round_trip() {
        let (_dir, file) = file_with("");
        file.set("LOCAL_VOICE", "Microsoft Zira Desktop").unwrap();
        file.set("SECRET", r#"a"b\c"#).unwrap();
        assert_eq!(
            file.get("LOCAL_VOICE").unwrap().as_deref(),
            Some("Microsoft Zira Desktop")
        );
        assert_eq!(file.get("SECRET").unwrap().as_deref(), Some(r#"a"b\c"#));
    }

    #[test]
    fn test_duplicates_collapse_on_write() {
        let (_dir, file) = file_with("PORT=1\nPORT=2\n");
        assert_eq!(file.get("PORT").unwrap().as_deref(), Some("2"));
        file.set("PORT", "3").unwrap();
        assert_eq!(file.entries().unwrap(), vec![("PORT".into(), "3".into())]);
    }

    #[test]
    fn test_remove_and_invalid_key() {
        let (_dir, file) = file_with("A=1\nB=2\n");
        file.remove("A").unwrap();
        file.remove("ZZZ").unwrap();
        assert_eq!(file.entries().unwrap(), vec![("B".into(), "2".into())]);
        assert!(matches!(file.set("bad key", "x"), Err(ConfigError::InvalidKey(_))));
    }
}
