//! Error types for typed key-value operations.
//!
//! Routine per-operation failures are swallowed by the façade and reported
//! through its log sink; the variants here are what escapes to callers
//! (lifecycle and contract violations) or what lower layers hand back to the
//! façade before it converts them.

use crate::value::TypeTag;

/// Result type for typed key-value operations.
pub type Result<T> = std::result::Result<T, KvError>;

/// Errors raised by the façade, codec, cipher and backend layers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum KvError {
    /// Façade used before `build()` or after `destroy()`.
    #[error("kv is not built; create one with KvBuilder::build()")]
    NotBuilt,

    /// A required argument was empty or absent (key, type descriptor).
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    /// The marshaller, envelope serializer or cipher rejected its input.
    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// A value could not be turned into its stored form.
    #[error("failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    /// A decoded value did not have the type the caller asked for.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: TypeTag, found: TypeTag },

    /// Elements of one container do not share a type, so the container
    /// cannot be described by a single element type.
    #[error("{0} elements must all have the same type")]
    MixedElements(TypeTag),

    /// The store cannot represent this kind of value.
    #[error("{store} cannot store {tag} values")]
    Unsupported { store: &'static str, tag: TypeTag },

    /// Adapter-level I/O failure.
    #[error("backend error: {0:#}")]
    Backend(#[from] anyhow::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl KvError {
    /// Create a decode error.
    pub fn decode(what: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            what,
            reason: reason.to_string(),
        }
    }

    /// Create an encode error.
    pub fn encode(what: &'static str, reason: impl ToString) -> Self {
        Self::Encode {
            what,
            reason: reason.to_string(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: TypeTag, found: TypeTag) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error is a lifecycle or contract violation that the
    /// façade propagates instead of logging.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::NotBuilt | Self::MissingArgument(_) | Self::MixedElements(_)
        )
    }
}
