//! Packed primitive store.
//!
//! Keeps each value as its raw primitive encoding rather than as text, the
//! way mobile key-value stores do: one wire-class byte followed by the
//! payload.
//!
//! | class   | byte | payload                                                   |
//! |---------|------|-----------------------------------------------------------|
//! | VARINT  | 0    | bool, int or long as a sign-extended base-128 varint      |
//! | FIXED64 | 1    | f64, little endian                                        |
//! | LEN     | 2    | UTF-8 string, or `0x01` + length-prefixed set elements    |
//! | FIXED32 | 5    | f32, little endian                                        |
//!
//! The encoding keeps the width of a value but not its declared type, so a
//! bool and an int share VARINT and reading a value back goes through the
//! typed probes and the heuristic engine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::Backend;
use super::redb::create_database;
use crate::error::KvError;
use crate::heuristic::TypedProbe;
use crate::value::{TypeTag, Value};

const PACKED_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("packed");

const VARINT: u8 = 0;
const FIXED64: u8 = 1;
const LEN: u8 = 2;
const FIXED32: u8 = 5;

/// First payload byte of a LEN entry holding a string set.
const SET_SENTINEL: u8 = crate::heuristic::SET_SENTINEL as u8;

/// Redb table of raw primitive encodings.
#[derive(Clone)]
pub struct PackedStore {
    db: Arc<Database>,
}

impl PackedStore {
    /// Opens or creates a packed store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its table
    /// cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = create_database(path.as_ref())?;
        let write_txn = db
            .begin_write()
            .context("Failed to begin initialization transaction")?;
        {
            let _table = write_txn
                .open_table(PACKED_TABLE)
                .context("Failed to initialize packed table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initialization transaction")?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Stores a scalar or a set of strings in its native encoding.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unsupported`] for lists, maps, objects and sets
    /// with non-string elements, and [`KvError::Backend`] if the write fails.
    pub fn put_value(&self, key: &str, value: &Value) -> crate::error::Result<()> {
        let bytes = encode_value(value)?;
        self.write(key, &bytes)?;
        Ok(())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(PACKED_TABLE)
                .context("Failed to open packed table")?;
            table
                .insert(key, bytes)
                .with_context(|| format!("Failed to insert key '{key}'"))?;
        }
        write_txn
            .commit()
            .context("Failed to commit put transaction")?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(PACKED_TABLE)
            .context("Failed to open packed table")?;
        let value = table
            .get(key)
            .with_context(|| format!("Failed to read key '{key}'"))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn read_all(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(PACKED_TABLE)
            .context("Failed to open packed table")?;
        let mut entries = Vec::new();
        for item in table.iter().context("Failed to iterate packed table")? {
            let (key, value) = item.context("Failed to read packed entry")?;
            entries.push((key.value().to_string(), value.value().to_vec()));
        }
        Ok(entries)
    }

    /// Reads the wire class and payload of `key`.
    fn entry(&self, key: &str) -> Result<Option<(u8, Vec<u8>)>> {
        Ok(self.read(key)?.and_then(|mut bytes| {
            if bytes.is_empty() {
                return None;
            }
            let payload = bytes.split_off(1);
            Some((bytes[0], payload))
        }))
    }
}

fn encode_value(value: &Value) -> crate::error::Result<Vec<u8>> {
    let mut out = Vec::new();
    match value {
        Value::Bool(b) => {
            out.push(VARINT);
            write_varint(&mut out, u64::from(*b));
        },
        Value::Int(i) => {
            out.push(VARINT);
            write_varint(&mut out, i64::from(*i) as u64);
        },
        Value::Long(l) => {
            out.push(VARINT);
            write_varint(&mut out, *l as u64);
        },
        Value::Float(f) => {
            out.push(FIXED32);
            out.extend_from_slice(&f.to_le_bytes());
        },
        Value::Double(d) => {
            out.push(FIXED64);
            out.extend_from_slice(&d.to_le_bytes());
        },
        Value::String(s) => {
            out.push(LEN);
            out.extend_from_slice(s.as_bytes());
        },
        Value::Set(items) => {
            out.push(LEN);
            out.push(SET_SENTINEL);
            for item in items {
                let Value::String(s) = item else {
                    return Err(unsupported(TypeTag::Set));
                };
                write_varint(&mut out, s.len() as u64);
                out.extend_from_slice(s.as_bytes());
            }
        },
        other => return Err(unsupported(other.type_tag())),
    }
    Ok(out)
}

fn unsupported(tag: TypeTag) -> KvError {
    KvError::Unsupported {
        store: "packed",
        tag,
    }
}

fn write_varint(out: &mut Vec<u8>, mut raw: u64) {
    while raw >= 0x80 {
        out.push((raw as u8 & 0x7f) | 0x80);
        raw >>= 7;
    }
    out.push(raw as u8);
}

/// Returns the decoded varint and the number of bytes it used.
fn read_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut raw = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        raw |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((raw, i + 1));
        }
    }
    None
}

fn decode_set(mut payload: &[u8]) -> Option<Vec<String>> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (len, used) = read_varint(payload)?;
        let len = usize::try_from(len).ok()?;
        let end = used.checked_add(len)?;
        let item = payload.get(used..end)?;
        items.push(String::from_utf8_lossy(item).into_owned());
        payload = &payload[end..];
    }
    Some(items)
}

/// Plain-text rendering of an entry for the untyped `Backend` view.
fn render(class: u8, payload: &[u8]) -> String {
    match class {
        VARINT => read_varint(payload)
            .map(|(raw, _)| (raw as i64).to_string())
            .unwrap_or_default(),
        FIXED32 => <[u8; 4]>::try_from(payload)
            .map(|b| f32::from_le_bytes(b).to_string())
            .unwrap_or_default(),
        FIXED64 => <[u8; 8]>::try_from(payload)
            .map(|b| f64::from_le_bytes(b).to_string())
            .unwrap_or_default(),
        _ => String::from_utf8_lossy(payload).into_owned(),
    }
}

impl TypedProbe for PackedStore {
    fn probe_string(&self, key: &str) -> Result<String> {
        Ok(match self.entry(key)? {
            Some((LEN, payload)) => String::from_utf8_lossy(&payload).into_owned(),
            _ => String::new(),
        })
    }

    fn probe_string_set(&self, key: &str) -> Result<Option<Vec<String>>> {
        Ok(match self.entry(key)? {
            Some((LEN, payload)) => match payload.split_first() {
                Some((&SET_SENTINEL, rest)) => decode_set(rest),
                _ => None,
            },
            Some((FIXED32 | FIXED64, _)) => Some(Vec::new()),
            _ => None,
        })
    }

    fn probe_float(&self, key: &str) -> Result<f32> {
        Ok(match self.entry(key)? {
            Some((FIXED32, payload)) => <[u8; 4]>::try_from(payload.as_slice())
                .map(f32::from_le_bytes)
                .unwrap_or(0.0),
            _ => 0.0,
        })
    }

    fn probe_double(&self, key: &str) -> Result<f64> {
        Ok(match self.entry(key)? {
            Some((FIXED64, payload)) => <[u8; 8]>::try_from(payload.as_slice())
                .map(f64::from_le_bytes)
                .unwrap_or(0.0),
            _ => 0.0,
        })
    }

    fn probe_int(&self, key: &str) -> Result<i32> {
        // low 32 bits of the varint
        Ok(self.probe_long(key)? as i32)
    }

    fn probe_long(&self, key: &str) -> Result<i64> {
        Ok(match self.entry(key)? {
            Some((VARINT, payload)) => read_varint(&payload).map_or(0, |(raw, _)| raw as i64),
            _ => 0,
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read_all()?.into_iter().map(|(key, _)| key).collect())
    }
}

impl Backend for PackedStore {
    fn name(&self) -> &'static str {
        "packed"
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.push(LEN);
        bytes.extend_from_slice(value.as_bytes());
        self.write(key, &bytes)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entry(key)?
            .map(|(class, payload)| render(class, &payload)))
    }

    fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .read_all()?
            .into_iter()
            .map(|(key, bytes)| {
                let text = bytes
                    .split_first()
                    .map(|(class, payload)| render(*class, payload))
                    .unwrap_or_default();
                (key, text)
            })
            .collect())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        let removed = {
            let mut table = write_txn
                .open_table(PACKED_TABLE)
                .context("Failed to open packed table")?;
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
        let keys = self.keys()?;
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(PACKED_TABLE)
                .context("Failed to open packed table")?;
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
            .open_table(PACKED_TABLE)
            .context("Failed to open packed table")?;
        table.len().context("Failed to count packed entries")
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.read(key)?.is_some())
    }

    fn as_probe(&self) -> Option<&dyn TypedProbe> {
        Some(self)
    }
}
