//! SQLite backend: one relational table of string pairs.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use super::{Backend, ensure_parent};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kvdb_table (
    key_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    kvdb_key   TEXT UNIQUE NOT NULL,
    kvdb_value TEXT
);
";

const UPSERT: &str = "
INSERT INTO kvdb_table (kvdb_key, kvdb_value) VALUES (?1, ?2)
ON CONFLICT(kvdb_key) DO UPDATE SET kvdb_value = excluded.kvdb_value
";

/// SQLite string store.
///
/// The connection is serialized behind a mutex; writes run in a
/// transaction.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens or creates a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot
    /// be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create kvdb_table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("Failed to begin transaction")?;
        tx.execute(UPSERT, params![key, value])
            .with_context(|| format!("Failed to upsert key '{key}'"))?;
        tx.commit().context("Failed to commit put transaction")
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT kvdb_value FROM kvdb_table WHERE kvdb_key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .with_context(|| format!("Failed to read key '{key}'"))?;
        Ok(value.map(Option::unwrap_or_default))
    }

    fn get_all(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT kvdb_key, kvdb_value FROM kvdb_table ORDER BY key_id")
            .context("Failed to prepare select")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                ))
            })
            .context("Failed to query kvdb_table")?;
        rows.collect::<rusqlite::Result<HashMap<_, _>>>()
            .context("Failed to read kvdb_table row")
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("Failed to begin transaction")?;
        let removed = tx
            .execute("DELETE FROM kvdb_table WHERE kvdb_key = ?1", params![key])
            .with_context(|| format!("Failed to remove key '{key}'"))?;
        tx.commit().context("Failed to commit delete transaction")?;
        Ok(removed > 0)
    }

    fn delete_all(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("Failed to begin transaction")?;
        tx.execute("DELETE FROM kvdb_table", [])
            .context("Failed to clear kvdb_table")?;
        tx.commit().context("Failed to commit clear transaction")
    }

    fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kvdb_table", [], |row| row.get(0))
            .context("Failed to count kvdb_table")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM kvdb_table WHERE kvdb_key = ?1",
                params![key],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("Failed to read key '{key}'"))?;
        Ok(found.is_some())
    }
}
