//! Flat-file backend: one JSON blob on disk.
//!
//! The file holds zero or more brace-delimited JSON objects, each a flat
//! string to string mapping. Reading scans the blob for object starts and
//! merges every object that parses, so a file with trailing garbage or a
//! truncated tail still yields the entries before it. Writing replaces the
//! file with a single object holding the whole mapping.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

use super::Backend;
use super::mirror::Mirror;

/// Matches the opening brace of a JSON object whose first token is a key or
/// the closing brace.
const OBJECT_START: &str = r#"\{\s*(?:"|\})"#;

/// JSON blob backend with an in-memory mirror.
pub struct FileBackend {
    mirror: Mirror,
}

impl FileBackend {
    /// Opens the blob at `path`, creating it on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let blob = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read KV file: {}", path.display()))?;
            parse_blob(&blob)?
        } else {
            HashMap::new()
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened file backend");
        Ok(Self {
            mirror: Mirror::new(path, entries, render),
        })
    }

    pub fn path(&self) -> &Path {
        self.mirror.path()
    }
}

fn render(entries: &BTreeMap<&str, &str>) -> Result<String> {
    serde_json::to_string(entries).context("Failed to serialize KV file")
}

/// Extracts every flat string object from `blob`. Later objects override
/// earlier ones; fragments that do not parse are skipped.
pub(crate) fn parse_blob(blob: &str) -> Result<HashMap<String, String>> {
    let starts = Regex::new(OBJECT_START).context("Invalid object pattern")?;
    let mut entries = HashMap::new();
    let mut consumed = 0;

    for found in starts.find_iter(blob) {
        let start = found.start();
        if start < consumed {
            continue;
        }
        let mut stream =
            serde_json::Deserializer::from_str(&blob[start..]).into_iter::<HashMap<String, String>>();
        match stream.next() {
            Some(Ok(object)) => {
                entries.extend(object);
                consumed = start + stream.byte_offset();
            },
            Some(Err(e)) => {
                tracing::debug!(offset = start, error = %e, "Skipping malformed KV fragment");
            },
            None => {},
        }
    }
    Ok(entries)
}

impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.mirror
            .put(key, value)
            .with_context(|| format!("Failed to write key '{key}'"))
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
        self.mirror.clear().context("Failed to clear KV file")
    }

    fn count(&self) -> Result<u64> {
        Ok(self.mirror.len() as u64)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.mirror.contains(key))
    }
}
