//! In-memory backend.
//!
//! Fast, non-persistent storage using DashMap for concurrent access. Ideal
//! for tests and embedding.

use std::collections::HashMap;

use anyhow::Result;
use dashmap::DashMap;

use super::Backend;

/// In-memory string store. All data is lost when it is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: DashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.get(key).map(|entry| entry.value().clone()))
    }

    fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.remove(key).is_some())
    }

    fn delete_all(&self) -> Result<()> {
        self.data.clear();
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.data.contains_key(key))
    }
}
