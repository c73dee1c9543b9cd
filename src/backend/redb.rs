//! Redb-backed storage.
//!
//! Persistent string storage using redb with ACID guarantees.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{Backend, ensure_parent};

/// Table holding one string per key.
pub(crate) const KV_TABLE: TableDefinition<'static, &'static str, &'static str> =
    TableDefinition::new("kv");

/// Opens or creates a redb database, creating parent directories first.
pub(crate) fn create_database(path: &Path) -> Result<Database> {
    ensure_parent(path)?;
    Database::create(path)
        .with_context(|| format!("Failed to open KV database: {}", path.display()))
}

/// Redb string store.
///
/// `RedbBackend` is `Clone` and can be shared across threads. The underlying
/// database handles concurrent access safely.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Opens or creates a redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - Database file cannot be opened or created (permissions, locked by another handle, etc.)
    /// - Initialization transaction fails to begin or commit
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = create_database(path.as_ref())?;

        // Create the table up front so reads never see it missing
        let write_txn = db
            .begin_write()
            .context("Failed to begin initialization transaction")?;
        {
            let _table = write_txn
                .open_table(KV_TABLE)
                .context("Failed to initialize KV table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initialization transaction")?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Backend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(KV_TABLE)
                .context("Failed to open KV table")?;
            table
                .insert(key, value)
                .with_context(|| format!("Failed to insert key '{key}'"))?;
        }
        write_txn
            .commit()
            .context("Failed to commit put transaction")?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(KV_TABLE)
            .context("Failed to open KV table")?;
        let value = table
            .get(key)
            .with_context(|| format!("Failed to read key '{key}'"))?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    fn get_all(&self) -> Result<HashMap<String, String>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(KV_TABLE)
            .context("Failed to open KV table")?;

        let mut entries = HashMap::new();
        for item in table.iter().context("Failed to iterate KV table")? {
            let (key, value) = item.context("Failed to read KV entry")?;
            entries.insert(key.value().to_string(), value.value().to_string());
        }
        Ok(entries)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        let removed = {
            let mut table = write_txn
                .open_table(KV_TABLE)
                .context("Failed to open KV table")?;
            table
                .remove(key)
                .with_context(|| format!("Failed to remove key '{key}'"))?
                .is_some()
        };
        write_txn
            .commit()
            .context("Failed to commit delete transaction")?;
        Ok(removed)
    }

    fn delete_all(&self) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(KV_TABLE)
                .context("Failed to open KV table")?;
            let keys = table
                .iter()
                .context("Failed to iterate KV table")?
                .map(|item| item.map(|(key, _)| key.value().to_string()))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read KV entry")?;
            for key in &keys {
                table
                    .remove(key.as_str())
                    .with_context(|| format!("Failed to remove key '{key}'"))?;
            }
        }
        write_txn
            .commit()
            .context("Failed to commit clear transaction")?;
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(KV_TABLE)
            .context("Failed to open KV table")?;
        table.len().context("Failed to count KV entries")
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(KV_TABLE)
            .context("Failed to open KV table")?;
        Ok(table
            .get(key)
            .with_context(|| format!("Failed to read key '{key}'"))?
            .is_some())
    }
}
