//! Configuration for the landing judge
//!
//! - `EnvFile`: the flat key=value file the operator and the control API share
//! - `Settings`: typed settings layered from defaults, environment and file
//! - `QuoteCatalog`: per-score quotes and messages with bundled defaults

pub mod constants;
mod env_file;
mod error;
mod quotes;
mod settings;

pub use env_file::{parse_line, EnvFile};
pub use error::ConfigError;
pub use quotes::{QuoteCatalog, QuoteDocument};
pub use settings::{Settings, SettingsLoader, SettingsUpdate, SETTINGS_KEYS};

use std::path::Path;

/// Write via a sibling temp file and rename, so readers never see a partial file
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "settings".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, bytes).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/file.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(!dir.path().join("nested/deeper/file.json.tmp").exists());
    }
}
