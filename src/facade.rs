//! The typed key-value façade.
//!
//! A [`Kv`] owns one configured pipeline and moves values through it:
//!
//! ```text
//! put:  Value -> codec -> cipher -> envelope -> backend
//! get:  backend -> envelope -> cipher -> codec -> Value
//!                  \-> heuristic probes (envelope rejected, probing backend)
//! ```
//!
//! Routine failures (backend I/O, undecodable entries) are logged and turned
//! into `false`, `None` or `0`. Only lifecycle and argument errors are
//! returned.

use std::collections::BTreeMap;

use crate::backend::Backend;
use crate::builder::KvBuilder;
use crate::cipher::Cipher;
use crate::codec::{Codec, Serializer};
use crate::descriptor::TypeDescriptor;
use crate::error::{KvError, Result};
use crate::heuristic;
use crate::log::LogSink;
use crate::value::Value;

/// Configured pipeline of a built [`Kv`].
pub(crate) struct Engine {
    pub(crate) backend: Box<dyn Backend>,
    pub(crate) cipher: Box<dyn Cipher>,
    pub(crate) codec: Box<dyn Codec>,
    pub(crate) serializer: Box<dyn Serializer>,
    pub(crate) log: Box<dyn LogSink>,
}

enum State {
    Uninitialized,
    Built(Engine),
    Destroyed,
}

/// Typed key-value store handle.
///
/// `Kv::default()` is an unbuilt handle; every operation on it except
/// [`Kv::is_built`] fails with [`KvError::NotBuilt`]. Build one with
/// [`KvBuilder`]:
///
/// ```ignore
/// use typedkv::{Kv, MemoryBackend};
///
/// let kv = Kv::builder().backend(MemoryBackend::new()).build()?;
/// kv.put("retries", 3)?;
/// assert_eq!(kv.get_as::<i32>("retries")?, Some(3));
/// ```
pub struct Kv {
    state: State,
}

impl Default for Kv {
    fn default() -> Self {
        Self {
            state: State::Uninitialized,
        }
    }
}

impl std::fmt::Debug for Kv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Uninitialized => "uninitialized".to_string(),
            State::Built(engine) => format!(
                "built(backend: {}, cipher: {})",
                engine.backend.name(),
                engine.cipher.name()
            ),
            State::Destroyed => "destroyed".to_string(),
        };
        f.debug_struct("Kv").field("state", &state).finish()
    }
}

impl Kv {
    pub(crate) fn from_engine(engine: Engine) -> Self {
        Self {
            state: State::Built(engine),
        }
    }

    /// Starts a builder with every component defaulted.
    pub fn builder() -> KvBuilder {
        KvBuilder::new()
    }

    /// Whether the handle is built and not yet destroyed.
    pub fn is_built(&self) -> bool {
        matches!(self.state, State::Built(_))
    }

    fn engine(&self) -> Result<&Engine> {
        match &self.state {
            State::Built(engine) => Ok(engine),
            State::Uninitialized | State::Destroyed => Err(KvError::NotBuilt),
        }
    }

    fn checked(&self, key: &str) -> Result<&Engine> {
        let engine = self.engine()?;
        if key.is_empty() {
            return Err(KvError::MissingArgument("key"));
        }
        Ok(engine)
    }

    /// Stores `value` under `key`. Returns false if the value could not be
    /// encoded or written.
    ///
    /// # Errors
    ///
    /// Same as [`Kv::put_option`].
    pub fn put(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        self.put_option(key, Some(value.into()))
    }

    /// Stores `value` if present. `None` stores nothing and returns false.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`], [`KvError::MissingArgument`] for an
    /// empty key, or [`KvError::MixedElements`] for a container whose
    /// elements do not share one type.
    pub fn put_option(&self, key: &str, value: Option<Value>) -> Result<bool> {
        let engine = self.checked(key)?;
        let descriptor = match value.as_ref().map(TypeDescriptor::of).transpose() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                engine.fail("put", key, &e);
                return Err(e);
            },
        };
        match engine.store(key, value.as_ref(), descriptor.as_ref()) {
            Ok(true) => {
                engine.emit(&format!(
                    "KV.put -> key: {key}, type: {}",
                    descriptor.map_or_else(|| "none".to_string(), |d| d.to_string())
                ));
                Ok(true)
            },
            Ok(false) => {
                engine.emit(&format!("KV.put -> key: {key}, nothing to store"));
                Ok(false)
            },
            Err(e) => {
                engine.fail("put", key, &e);
                Ok(false)
            },
        }
    }

    /// Reads and decodes the value under `key`. `None` when the key is
    /// absent or its entry cannot be decoded.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`] or [`KvError::MissingArgument`] for an
    /// empty key.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let engine = self.checked(key)?;
        match engine.load(key) {
            Ok(Some(value)) => {
                engine.emit(&format!(
                    "KV.get -> key: {key}, type: {}",
                    TypeDescriptor::of(&value)
                        .map_or_else(|_| value.type_tag().to_string(), |d| d.to_string())
                ));
                Ok(Some(value))
            },
            Ok(None) => {
                engine.emit(&format!("KV.get -> key: {key}, absent"));
                Ok(None)
            },
            Err(e) => {
                engine.fail("get", key, &e);
                Ok(None)
            },
        }
    }

    /// Reads the value under `key` as `T`. `None` also when the stored value
    /// has another type.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`] or [`KvError::MissingArgument`] for an
    /// empty key.
    pub fn get_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: TryFrom<Value, Error = KvError>,
    {
        let Some(value) = self.get(key)? else {
            return Ok(None);
        };
        match T::try_from(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(e) => {
                self.engine()?.fail("get_as", key, &e);
                Ok(None)
            },
        }
    }

    /// Reads the value under `key`, or returns `default`.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`] or [`KvError::MissingArgument`] for an
    /// empty key.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Decodes every entry. Entries that fail to decode are left out.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`].
    pub fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        let engine = self.engine()?;
        let raw = match engine.backend.get_all() {
            Ok(raw) => raw,
            Err(e) => {
                engine.fail("get_all", "*", &KvError::Backend(e));
                return Ok(BTreeMap::new());
            },
        };

        let mut values = BTreeMap::new();
        let mut skipped = 0usize;
        for (key, stored) in raw {
            match engine.decode_stored(&key, &stored) {
                Ok(value) => {
                    values.insert(key, value);
                },
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(key = %key, error = %redacted(&e), "Skipping undecodable entry");
                },
            }
        }
        engine.emit(&format!(
            "KV.get_all -> entries: {}, skipped: {skipped}",
            values.len()
        ));
        Ok(values)
    }

    /// Number of stored entries; 0 if the backend fails.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`].
    pub fn count(&self) -> Result<u64> {
        let engine = self.engine()?;
        match engine.backend.count() {
            Ok(count) => {
                engine.emit(&format!("KV.count -> {count}"));
                Ok(count)
            },
            Err(e) => {
                engine.fail("count", "*", &KvError::Backend(e));
                Ok(0)
            },
        }
    }

    /// Removes `key`. Returns whether it existed.
    ///
    /// `false` also covers a failing backend. The two cases log differently:
    /// `existed: false` for an absent key, `failed: ..` for a backend error.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`] or [`KvError::MissingArgument`] for an
    /// empty key.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let engine = self.checked(key)?;
        match engine.backend.delete(key) {
            Ok(existed) => {
                engine.emit(&format!("KV.delete -> key: {key}, existed: {existed}"));
                Ok(existed)
            },
            Err(e) => {
                engine.fail("delete", key, &KvError::Backend(e));
                Ok(false)
            },
        }
    }

    /// Removes every entry. Returns false if the backend fails.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`].
    pub fn delete_all(&self) -> Result<bool> {
        let engine = self.engine()?;
        match engine.backend.delete_all() {
            Ok(()) => {
                engine.emit("KV.delete_all -> done");
                Ok(true)
            },
            Err(e) => {
                engine.fail("delete_all", "*", &KvError::Backend(e));
                Ok(false)
            },
        }
    }

    /// Whether `key` is stored.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`] or [`KvError::MissingArgument`] for an
    /// empty key.
    pub fn contains(&self, key: &str) -> Result<bool> {
        let engine = self.checked(key)?;
        match engine.backend.contains(key) {
            Ok(found) => {
                engine.emit(&format!("KV.contains -> key: {key}, found: {found}"));
                Ok(found)
            },
            Err(e) => {
                engine.fail("contains", key, &KvError::Backend(e));
                Ok(false)
            },
        }
    }

    /// Drops the pipeline and its backend. Every later call fails with
    /// [`KvError::NotBuilt`].
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NotBuilt`] if the handle is not built.
    pub fn destroy(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Destroyed) {
            State::Built(engine) => {
                engine.emit(&format!("KV.destroy -> backend: {}", engine.backend.name()));
                Ok(())
            },
            previous => {
                self.state = previous;
                Err(KvError::NotBuilt)
            },
        }
    }
}

impl Engine {
    fn emit(&self, message: &str) {
        tracing::debug!(target: "typedkv", "{message}");
        self.log.on_log(message);
    }

    fn fail(&self, op: &str, key: &str, error: &KvError) {
        let reason = redacted(error);
        tracing::warn!(op, key, error = %reason, "KV operation failed");
        self.log
            .on_log(&format!("KV.{op} -> key: {key}, failed: {reason}"));
    }

    fn store(
        &self,
        key: &str,
        value: Option<&Value>,
        descriptor: Option<&TypeDescriptor>,
    ) -> Result<bool> {
        let Some(encoded) = self.codec.encode(value)? else {
            return Ok(false);
        };
        let descriptor = descriptor.ok_or(KvError::MissingArgument("type descriptor"))?;
        let ciphertext = self.cipher.encrypt(key, &encoded)?;
        let stored = self.serializer.serialize(&ciphertext, descriptor);
        self.backend.put(key, &stored)?;
        Ok(true)
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        match self.backend.get(key)? {
            Some(stored) => self.decode_stored(key, &stored).map(Some),
            None => Ok(None),
        }
    }

    /// Envelope first. When the backend can be probed, anything the envelope
    /// path rejects goes to the heuristic engine: a raw string may look like
    /// an envelope without being one.
    fn decode_stored(&self, key: &str, stored: &str) -> Result<Value> {
        let decoded = self.serializer.deserialize(stored).and_then(|(descriptor, payload)| {
            let plaintext = self.cipher.decrypt(key, &payload)?;
            self.codec.decode(&plaintext, Some(&descriptor))
        });
        match (decoded, self.backend.as_probe()) {
            (Ok(value), _) => Ok(value),
            (Err(_), Some(probe)) => Ok(heuristic::recover(probe, key, self.log.as_ref())?),
            (Err(envelope_error), None) => Err(envelope_error),
        }
    }
}

/// Error text safe for logs: decode and encode reasons can quote the
/// plaintext, so only their subject is kept.
fn redacted(error: &KvError) -> String {
    match error {
        KvError::Decode { what, .. } => format!("failed to decode {what}"),
        KvError::Encode { what, .. } => format!("failed to encode {what}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cipher::NoCipher;
    use crate::value::TypeTag;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn kv() -> Kv {
        KvBuilder::new()
            .backend(MemoryBackend::new())
            .build()
            .unwrap()
    }

    #[test]
    fn test_unbuilt_handle() {
        let kv = Kv::default();
        assert!(!kv.is_built());
        assert!(matches!(kv.put("a", 1i32), Err(KvError::NotBuilt)));
        assert!(matches!(kv.get("a"), Err(KvError::NotBuilt)));
        assert!(matches!(kv.count(), Err(KvError::NotBuilt)));
        assert!(matches!(kv.get_all(), Err(KvError::NotBuilt)));
    }

    #[test]
    fn test_destroy_is_terminal() {
        let mut kv = kv();
        kv.put("a", "x").unwrap();
        kv.destroy().unwrap();
        assert!(!kv.is_built());
        assert!(matches!(kv.get("a"), Err(KvError::NotBuilt)));
        assert!(matches!(kv.delete_all(), Err(KvError::NotBuilt)));
        assert!(matches!(kv.destroy(), Err(KvError::NotBuilt)));
    }

    #[test]
    fn test_destroy_unbuilt_keeps_state() {
        let mut kv = Kv::default();
        assert!(matches!(kv.destroy(), Err(KvError::NotBuilt)));
        assert!(format!("{kv:?}").contains("uninitialized"));
    }

    #[test]
    fn test_empty_key_is_contract_violation() {
        let kv = kv();
        for result in [kv.put("", 1i32).map(|_| ()), kv.get("").map(|_| ())] {
            assert!(matches!(result, Err(KvError::MissingArgument("key"))));
        }
        assert!(matches!(kv.contains(""), Err(KvError::MissingArgument("key"))));
        assert!(matches!(kv.delete(""), Err(KvError::MissingArgument("key"))));
    }

    #[test]
    fn test_put_none_stores_nothing() {
        let kv = kv();
        assert!(!kv.put_option("a", None).unwrap());
        assert!(!kv.contains("a").unwrap());
    }

    #[test]
    fn test_stored_form_is_envelope() {
        let backend = Arc::new(MemoryBackend::new());
        let kv = KvBuilder::new()
            .backend(Arc::clone(&backend))
            .cipher(NoCipher)
            .build()
            .unwrap();
        kv.put("n", 42i64).unwrap();
        assert_eq!(backend.get("n").unwrap().as_deref(), Some("long##0V@42"));
    }

    #[test]
    fn test_corrupt_entry_reads_as_none_and_logs() {
        let backend = Arc::new(MemoryBackend::new());
        let messages = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = {
            let messages = Arc::clone(&messages);
            move |msg: &str| messages.lock().push(msg.to_string())
        };
        let kv = KvBuilder::new()
            .backend(Arc::clone(&backend))
            .log_sink(sink)
            .build()
            .unwrap();

        backend.put("bad", "int##0V@not-base64!").unwrap();
        backend.put("raw", "no envelope").unwrap();
        assert_eq!(kv.get("bad").unwrap(), None);
        assert_eq!(kv.get("raw").unwrap(), None);

        let messages = messages.lock();
        assert!(messages.iter().any(|m| m.starts_with("KV.get -> key: bad, failed")));
        assert!(messages.iter().any(|m| m.starts_with("KV.get -> key: raw, failed")));
    }

    #[test]
    fn test_mixed_container_put_is_rejected() {
        let messages = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = {
            let messages = Arc::clone(&messages);
            move |msg: &str| messages.lock().push(msg.to_string())
        };
        let kv = KvBuilder::new()
            .backend(MemoryBackend::new())
            .log_sink(sink)
            .build()
            .unwrap();

        let mixed = Value::List(vec![Value::Int(1), Value::from("two")]);
        assert!(matches!(kv.put("m", mixed), Err(KvError::MixedElements(TypeTag::List))));
        assert!(!kv.contains("m").unwrap());
        assert!(messages.lock().iter().any(|m| m.starts_with("KV.put -> key: m, failed")));
    }

    struct FailingDelete(MemoryBackend);

    impl Backend for FailingDelete {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.0.put(key, value)
        }

        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.get(key)
        }

        fn get_all(&self) -> anyhow::Result<std::collections::HashMap<String, String>> {
            self.0.get_all()
        }

        fn delete(&self, _key: &str) -> anyhow::Result<bool> {
            anyhow::bail!("disk unavailable")
        }

        fn delete_all(&self) -> anyhow::Result<()> {
            self.0.delete_all()
        }

        fn count(&self) -> anyhow::Result<u64> {
            self.0.count()
        }
    }

    #[test]
    fn test_delete_failure_logs_apart_from_absence() {
        let messages = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = {
            let messages = Arc::clone(&messages);
            move |msg: &str| messages.lock().push(msg.to_string())
        };
        let failing = KvBuilder::new()
            .backend(FailingDelete(MemoryBackend::new()))
            .log_sink(sink.clone())
            .build()
            .unwrap();
        failing.put("a", 1i32).unwrap();
        assert!(!failing.delete("a").unwrap());
        assert!(failing.contains("a").unwrap());

        let healthy = KvBuilder::new()
            .backend(MemoryBackend::new())
            .log_sink(sink)
            .build()
            .unwrap();
        assert!(!healthy.delete("a").unwrap());

        let messages = messages.lock();
        assert!(messages.iter().any(|m| m.starts_with("KV.delete -> key: a, failed")));
        assert!(messages.iter().any(|m| m == "KV.delete -> key: a, existed: false"));
    }

    #[test]
    fn test_get_as_type_mismatch_is_none() {
        let kv = kv();
        kv.put("n", 7i32).unwrap();
        assert_eq!(kv.get_as::<i32>("n").unwrap(), Some(7));
        assert_eq!(kv.get_as::<String>("n").unwrap(), None);
    }

    #[test]
    fn test_redacted_hides_reasons() {
        let err = KvError::decode("int", "'secret-value': invalid digit");
        assert_eq!(redacted(&err), "failed to decode int");
        assert_eq!(redacted(&KvError::NotBuilt), KvError::NotBuilt.to_string());
    }
}
