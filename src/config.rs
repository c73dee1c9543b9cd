//! Configuration for building a store from a TOML file.
//!
//! ```toml
//! [backend]
//! kind = "sqlite"          # preferences | redb | sqlite | file | packed | memory
//! path = "data/kv.sqlite"
//!
//! [encryption]
//! mode = "per-entry"       # none | fixed | per-entry
//! secret = "change me"
//! ```
//!
//! Both tables are optional; the defaults are the platform preferences file
//! and fixed key material with the built-in secret.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::{
    Backend, FileBackend, MemoryBackend, PackedStore, PreferencesBackend, RedbBackend,
    SqliteBackend,
};
use crate::cipher::{AesCipher, Cipher, DEFAULT_SECRET, KeyMaterial, NoCipher};

/// Config file looked up by [`KvConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = "typedkv.toml";

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KvConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

/// Which backend to open, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackendConfig {
    /// Platform preferences file, by name or explicit path.
    Preferences {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Redb {
        path: PathBuf,
    },
    /// Without a path the database lives in memory.
    Sqlite {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    File {
        path: PathBuf,
    },
    Packed {
        path: PathBuf,
    },
    Memory,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Preferences {
            name: None,
            path: None,
        }
    }
}

impl BackendConfig {
    /// Opens the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot open its storage.
    pub fn open(&self) -> Result<Box<dyn Backend>> {
        Ok(match self {
            Self::Preferences {
                path: Some(path), ..
            } => Box::new(PreferencesBackend::open(path)?),
            Self::Preferences {
                name: Some(name), ..
            } => Box::new(PreferencesBackend::open_named(name)?),
            Self::Preferences { .. } => Box::new(PreferencesBackend::open_default()?),
            Self::Redb { path } => Box::new(RedbBackend::open(path)?),
            Self::Sqlite { path: Some(path) } => Box::new(SqliteBackend::open(path)?),
            Self::Sqlite { path: None } => Box::new(SqliteBackend::in_memory()?),
            Self::File { path } => Box::new(FileBackend::open(path)?),
            Self::Packed { path } => Box::new(PackedStore::open(path)?),
            Self::Memory => Box::new(MemoryBackend::new()),
        })
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Self::Preferences { path, .. } | Self::Sqlite { path } => path.as_deref(),
            Self::Redb { path } | Self::File { path } | Self::Packed { path } => Some(path),
            Self::Memory => None,
        }
    }
}

/// How stored values are encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionMode {
    /// Values are stored as plain JSON.
    None,
    /// One key and nonce for every entry.
    #[default]
    Fixed,
    /// Per-entry key and random nonce.
    PerEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub mode: EncryptionMode,
    /// Falls back to the built-in secret when unset.
    #[serde(default)]
    pub secret: Option<String>,
}

impl EncryptionConfig {
    /// Builds the configured cipher. It is not initialized yet.
    pub fn cipher(&self) -> Box<dyn Cipher> {
        let secret = self
            .secret
            .clone()
            .unwrap_or_else(|| DEFAULT_SECRET.to_string());
        match self.mode {
            EncryptionMode::None => Box::new(NoCipher),
            EncryptionMode::Fixed => Box::new(AesCipher::new(KeyMaterial::Fixed(secret))),
            EncryptionMode::PerEntry => Box::new(AesCipher::new(KeyMaterial::PerEntry(secret))),
        }
    }
}

impl KvConfig {
    /// Load configuration from `typedkv.toml` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - A field is unknown or has an invalid type
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or unknown fields.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate configuration.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails with one or more errors:
    /// - Empty backend path or preferences name
    /// - Preferences with both a name and a path
    /// - Empty encryption secret
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Backend
        if let Some(path) = self.backend.path()
            && path.as_os_str().is_empty()
        {
            errors.push("backend.path cannot be empty".to_string());
        }
        match &self.backend {
            BackendConfig::Preferences {
                name: Some(_),
                path: Some(_),
            } => {
                errors.push("backend: set either name or path for preferences, not both".to_string());
            },
            BackendConfig::Preferences { name: Some(name), .. } if name.trim().is_empty() => {
                errors.push("backend.name cannot be empty".to_string());
            },
            BackendConfig::Memory => {
                warnings.push("backend 'memory' does not persist anything".to_string());
            },
            BackendConfig::Sqlite { path: None } => {
                warnings.push(
                    "backend 'sqlite' without a path uses an in-memory database".to_string(),
                );
            },
            _ => {},
        }

        // 2. Encryption
        match self.encryption.mode {
            EncryptionMode::None => {
                warnings.push("encryption is disabled; values are stored in plain text".to_string());
            },
            EncryptionMode::Fixed => {
                warnings.push(
                    "encryption.mode 'fixed' reuses one key and nonce for every entry\n  \
                     Recommendation: use mode = \"per-entry\" for new stores"
                        .to_string(),
                );
            },
            EncryptionMode::PerEntry => {},
        }
        match self.encryption.secret.as_deref() {
            Some("") if self.encryption.mode != EncryptionMode::None => {
                errors.push("encryption.secret cannot be empty".to_string());
            },
            None if self.encryption.mode != EncryptionMode::None => {
                warnings.push("encryption.secret is not set; using the built-in secret".to_string());
            },
            _ => {},
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}
