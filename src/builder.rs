//! Builder for [`Kv`] handles.
//!
//! Every component is optional. Defaults are created in `build()`, once:
//!
//! | component  | default                                              |
//! |------------|------------------------------------------------------|
//! | backend    | [`PreferencesBackend::open_default`]                 |
//! | cipher     | [`AesCipher`] with fixed built-in key material       |
//! | codec      | [`JsonCodec`] over the configured marshaller         |
//! | marshaller | [`JsonMarshaller`]                                   |
//! | serializer | [`HeaderSerializer`]                                 |
//! | log sink   | [`NoopLog`]                                          |
//!
//! A cipher whose `init()` fails is replaced by [`NoCipher`], for overridden
//! ciphers too, and the fallback is logged.

use crate::backend::{Backend, PreferencesBackend};
use crate::cipher::{AesCipher, Cipher, NoCipher};
use crate::codec::{Codec, HeaderSerializer, JsonCodec, JsonMarshaller, Marshaller, Serializer};
use crate::config::KvConfig;
use crate::error::{KvError, Result};
use crate::facade::{Engine, Kv};
use crate::log::{LogSink, NoopLog};

/// Collects component overrides for a [`Kv`].
#[derive(Default)]
pub struct KvBuilder {
    backend: Option<Box<dyn Backend>>,
    cipher: Option<Box<dyn Cipher>>,
    marshaller: Option<Box<dyn Marshaller>>,
    codec: Option<Box<dyn Codec>>,
    serializer: Option<Box<dyn Serializer>>,
    log: Option<Box<dyn LogSink>>,
}

impl KvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the backend and cipher from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Config`] if the configuration is invalid or its
    /// backend cannot be opened.
    pub fn from_config(config: &KvConfig) -> Result<Self> {
        let validation = config
            .validate()
            .map_err(|e| KvError::Config(format!("{e:#}")))?;
        for warning in &validation.warnings {
            tracing::warn!("{warning}");
        }
        let backend = config
            .backend
            .open()
            .map_err(|e| KvError::Config(format!("{e:#}")))?;
        Ok(Self {
            backend: Some(backend),
            cipher: Some(config.encryption.cipher()),
            ..Self::default()
        })
    }

    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    pub fn boxed_backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn cipher(mut self, cipher: impl Cipher + 'static) -> Self {
        self.cipher = Some(Box::new(cipher));
        self
    }

    /// Marshaller for the default codec. Ignored when a codec is set.
    pub fn marshaller(mut self, marshaller: impl Marshaller + 'static) -> Self {
        self.marshaller = Some(Box::new(marshaller));
        self
    }

    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Some(Box::new(codec));
        self
    }

    pub fn serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Some(Box::new(serializer));
        self
    }

    pub fn log_sink(mut self, log: impl LogSink + 'static) -> Self {
        self.log = Some(Box::new(log));
        self
    }

    /// Materializes defaults and returns a built handle.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Backend`] if the default preferences backend
    /// cannot be opened.
    pub fn build(self) -> Result<Kv> {
        let Self {
            backend,
            cipher,
            marshaller,
            codec,
            serializer,
            log,
        } = self;

        let log = log.unwrap_or_else(|| Box::new(NoopLog));
        let backend = match backend {
            Some(backend) => backend,
            None => Box::new(PreferencesBackend::open_default()?),
        };

        let mut cipher = cipher.unwrap_or_else(|| Box::new(AesCipher::default()));
        if !cipher.init() {
            let failed = cipher.name();
            tracing::warn!(cipher = failed, "Cipher failed to initialize, storing values unencrypted");
            log.on_log(&format!("KV.build -> cipher {failed} unavailable, using none"));
            cipher = Box::new(NoCipher);
        }

        let codec = codec.unwrap_or_else(|| {
            Box::new(JsonCodec::new(
                marshaller.unwrap_or_else(|| Box::new(JsonMarshaller)),
            ))
        });
        let serializer = serializer.unwrap_or_else(|| Box::new(HeaderSerializer));

        let message = format!(
            "KV.build -> backend: {}, cipher: {}",
            backend.name(),
            cipher.name()
        );
        tracing::debug!(target: "typedkv", "{message}");
        log.on_log(&message);

        Ok(Kv::from_engine(Engine {
            backend,
            cipher,
            codec,
            serializer,
            log,
        }))
    }
}
