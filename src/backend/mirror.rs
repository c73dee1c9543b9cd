//! Whole-file stores kept in memory.
//!
//! The file and preferences backends hold the full mapping in memory and
//! rewrite the whole file on every change. The mirror is only updated after
//! the new file has been renamed into place, so a failed write leaves both
//! the file and the mirror unchanged.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Result;
use parking_lot::Mutex;

use super::replace_file;

/// Renders the full mapping as file contents.
pub(super) type Render = fn(&BTreeMap<&str, &str>) -> Result<String>;

pub(super) struct Mirror {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
    render: Render,
}

impl Mirror {
    pub(super) fn new(path: PathBuf, entries: HashMap<String, String>, render: Render) -> Self {
        Self {
            path,
            entries: Mutex::new(entries),
            render,
        }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    pub(super) fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub(super) fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().clone()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(super) fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub(super) fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|existing| existing == value) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.write(&next)?;
        *entries = next;
        Ok(())
    }

    pub(super) fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);
        self.write(&next)?;
        *entries = next;
        Ok(true)
    }

    pub(super) fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock();
        let next = HashMap::new();
        self.write(&next)?;
        *entries = next;
        Ok(())
    }

    fn write(&self, entries: &HashMap<String, String>) -> Result<()> {
        let sorted: BTreeMap<&str, &str> = entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let contents = (self.render)(&sorted)?;
        replace_file(&self.path, contents.as_bytes())
    }
}
