//! Untyped string storage backends.
//!
//! Every backend stores plain strings under string keys; typing happens in
//! the façade above. Variants:
//!
//! - **PreferencesBackend**: flat TOML file in the platform config directory (default)
//! - **RedbBackend**: embedded redb database
//! - **SqliteBackend**: single relational table
//! - **FileBackend**: one JSON blob, mirrored in memory
//! - **PackedStore**: redb table of raw primitive encodings with typed probes
//! - **MemoryBackend**: non-persistent, for tests and embedding
//!
//! Implement [`Backend`] to plug in another store:
//!
//! ```ignore
//! use typedkv::{Backend, KvBuilder};
//!
//! struct RemoteBackend { /* ... */ }
//! impl Backend for RemoteBackend { /* ... */ }
//!
//! let kv = KvBuilder::new().backend(RemoteBackend::new()).build()?;
//! ```

mod file;
mod memory;
mod mirror;
mod packed;
mod prefs;
mod redb;
mod sqlite;

#[cfg(test)]
mod tests;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use packed::PackedStore;
pub use prefs::{DEFAULT_PREFERENCES_NAME, PreferencesBackend};
pub use redb::RedbBackend;
pub use sqlite::SqliteBackend;

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::heuristic::TypedProbe;

/// String-keyed, string-valued storage.
///
/// Backends must be thread-safe and must never leave a partial write
/// behind: either the new value is stored or the old one is kept.
pub trait Backend: Send + Sync {
    /// Short name for log messages.
    fn name(&self) -> &'static str;

    /// Stores a value, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Returns the stored value, or `None` if the key is absent. An empty
    /// string is a stored value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Returns a snapshot of every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn get_all(&self) -> Result<HashMap<String, String>>;

    /// Removes a key. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every entry. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn delete_all(&self) -> Result<()>;

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn count(&self) -> Result<u64>;

    /// Checks whether a key is stored.
    ///
    /// Default implementation uses `get()`, but backends may override
    /// for efficiency.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Typed-probe view of this backend, for stores that keep raw primitive
    /// encodings instead of strings.
    fn as_probe(&self) -> Option<&dyn TypedProbe> {
        None
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn get_all(&self) -> Result<HashMap<String, String>> {
        (**self).get_all()
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }

    fn delete_all(&self) -> Result<()> {
        (**self).delete_all()
    }

    fn count(&self) -> Result<u64> {
        (**self).count()
    }

    fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key)
    }

    fn as_probe(&self) -> Option<&dyn TypedProbe> {
        (**self).as_probe()
    }
}

/// Creates the parent directory of `path` if it has one.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Atomically replaces `path` with `contents`: temp file in the same
/// directory, fsync, rename.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents)
        .context("Failed to write temp file")?;
    tmp.as_file()
        .sync_all()
        .context("Failed to sync temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
