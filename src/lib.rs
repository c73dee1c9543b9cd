//! Typed key-value persistence over interchangeable string backends.
//!
//! Every backend stores only strings. `typedkv` keeps the original type of a
//! value by writing a small type descriptor in front of its encrypted JSON
//! encoding, and restores it on read:
//!
//! ```ignore
//! use std::collections::HashMap;
//! use typedkv::{KvBuilder, SqliteBackend, Value};
//!
//! let kv = KvBuilder::new()
//!     .backend(SqliteBackend::open("prefs.sqlite")?)
//!     .build()?;
//!
//! kv.put("volume", 0.8f32)?;
//! kv.put("scores", HashMap::from([("ada".to_string(), 12i64)]))?;
//!
//! assert_eq!(kv.get_as::<f32>("volume")?, Some(0.8));
//! let scores: HashMap<String, i64> = kv.get("scores")?.unwrap().into_hash_map()?;
//! ```
//!
//! Stores that keep raw primitive encodings instead of strings
//! ([`PackedStore`]) are read back through the [`heuristic`] engine, which
//! infers the type by probing.
//!
//! # Modules
//!
//! - [`backend`] - string storage variants and the [`Backend`] trait
//! - [`cipher`] - AES-256-GCM and the identity cipher
//! - [`codec`] - JSON marshalling, descriptor-driven decoding, stored envelope
//! - [`descriptor`] - type descriptors resolved from values
//! - [`heuristic`] - type recovery from typed probes
//! - [`config`] - TOML configuration
//! - [`log`] - per-operation log sinks

pub mod backend;
pub mod builder;
pub mod cipher;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod facade;
pub mod heuristic;
pub mod log;
pub mod value;

pub use backend::{
    Backend, FileBackend, MemoryBackend, PackedStore, PreferencesBackend, RedbBackend,
    SqliteBackend,
};
pub use builder::KvBuilder;
pub use cipher::{AesCipher, Cipher, KeyMaterial, NoCipher};
pub use codec::{Codec, HeaderSerializer, JsonCodec, JsonMarshaller, Marshaller, Serializer};
pub use config::{BackendConfig, EncryptionConfig, EncryptionMode, KvConfig};
pub use descriptor::{ContainerKind, TypeDescriptor};
pub use error::{KvError, Result};
pub use facade::Kv;
pub use heuristic::{Ambiguity, TypedProbe};
pub use log::{LogSink, NoopLog, TracingLog};
pub use value::{TypeTag, Value};
