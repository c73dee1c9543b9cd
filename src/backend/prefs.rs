//! Platform preferences backend.
//!
//! A flat TOML table of string values stored under the user's
//! configuration directory, e.g. `~/.config/typedkv/KVSP.toml` on Linux.
//! Every change is committed to disk before the call returns.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::Backend;
use super::mirror::Mirror;

/// Preferences file name used when none is given.
pub const DEFAULT_PREFERENCES_NAME: &str = "KVSP";

const APP_DIR: &str = "typedkv";

/// Preferences file backend.
pub struct PreferencesBackend {
    mirror: Mirror,
}

impl PreferencesBackend {
    /// Opens the default preferences file.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no configuration directory or
    /// the file exists but cannot be parsed.
    pub fn open_default() -> Result<Self> {
        Self::open_named(DEFAULT_PREFERENCES_NAME)
    }

    /// Opens `<config dir>/typedkv/<name>.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no configuration directory or
    /// the file exists but cannot be parsed.
    pub fn open_named(name: &str) -> Result<Self> {
        Self::open(Self::named_path(name)?)
    }

    /// Path of a named preferences file.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no configuration directory.
    pub fn named_path(name: &str) -> Result<PathBuf> {
        let base = dirs::config_dir().context("Failed to locate the configuration directory")?;
        Ok(base.join(APP_DIR).join(format!("{name}.toml")))
    }

    /// Opens a preferences file at an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries: HashMap<String, String> = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse preferences: {}", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            mirror: Mirror::new(path, entries, render),
        })
    }

    pub fn path(&self) -> &Path {
        self.mirror.path()
    }
}

fn render(entries: &BTreeMap<&str, &str>) -> Result<String> {
    toml::to_string(entries).context("Failed to serialize preferences")
}

impl Backend for PreferencesBackend {
    fn name(&self) -> &'static str {
        "preferences"
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.mirror
            .put(key, value)
            .with_context(|| format!("Failed to commit key '{key}'"))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.mirror.get(key))
    }

    fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self.mirror.snapshot())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.mirror
            .delete(key)
            .with_context(|| format!("Failed to remove key '{key}'"))
    }

    fn delete_all(&self) -> Result<()> {
        self.mirror.clear().context("Failed to clear preferences")
    }

    fn count(&self) -> Result<u64> {
        Ok(self.mirror.len() as u64)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.mirror.contains(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_is_plain_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("prefs").join("KVSP.toml");
        let prefs = PreferencesBackend::open(&path).unwrap();
        prefs.put("user.name", "int##0V@42").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let table: toml::Table = toml::from_str(&content).unwrap();
        assert_eq!(table["user.name"].as_str(), Some("int##0V@42"));
    }

    #[test]
    fn test_malformed_file_fails_to_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(PreferencesBackend::open(&path).is_err());
    }

    #[test]
    fn test_named_path_layout() {
        if let Ok(path) = PreferencesBackend::named_path("Custom") {
            assert!(path.ends_with("typedkv/Custom.toml"));
        }
    }
}
