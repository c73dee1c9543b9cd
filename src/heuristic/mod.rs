//! Heuristic type recovery.
//!
//! Stores that keep raw primitive encodings lose the declared type of a
//! value. The engine recovers one of string, string set, float, double, int
//! or long by probing the stored bytes with every typed read and picking the
//! first match, in this order:
//!
//! 1. **String**: a non-empty string probe is the answer, unless it starts
//!    with the set sentinel `\u{1}`, in which case the set probe is.
//! 2. **Float / double**: a present-but-empty set probe means a fixed-width
//!    number. A float probe of exactly `0.0` or NaN means the bytes were not
//!    a float, so the double probe is returned; otherwise the float.
//! 3. **Int / long**: differing probes mean the value did not fit 32 bits
//!    and is a long; equal probes give an int.
//!
//! Some outcomes are collisions the encoding cannot resolve (a bool reads as
//! int `0`/`1`, an absent key reads as int `0`). They are returned as-is and
//! reported as [`Ambiguity`] warnings.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;

use crate::log::LogSink;
use crate::value::Value;

/// First character of a string probe that holds a string set.
pub const SET_SENTINEL: char = '\u{1}';

/// Typed reads of one raw stored value.
///
/// Each probe returns its type's default (`""`, `0`, `0.0`, `None`) when the
/// stored bytes are absent or of another width.
pub trait TypedProbe {
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn probe_string(&self, key: &str) -> Result<String>;

    /// `None` for absent and non-set data; `Some(vec![])` when the stored
    /// bytes are present but are not a string set.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn probe_string_set(&self, key: &str) -> Result<Option<Vec<String>>>;

    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn probe_float(&self, key: &str) -> Result<f32>;

    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn probe_double(&self, key: &str) -> Result<f64>;

    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn probe_int(&self, key: &str) -> Result<i32>;

    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn probe_long(&self, key: &str) -> Result<i64>;

    /// Every stored key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    fn keys(&self) -> Result<Vec<String>>;
}

/// A recovered value whose type the stored bytes cannot pin down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambiguity {
    /// Float probe read zero or NaN; the value was returned as a double.
    FloatZeroOrNan,
    /// Int 1 may have been `true`.
    IntOrBool,
    /// Int 0 may have been `false`, an empty string or an absent key.
    IntZero,
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FloatZeroOrNan => "float probe was zero or NaN, returned as double",
            Self::IntOrBool => "int 1 may have been stored as true",
            Self::IntZero => "int 0 may have been false, an empty string or an absent key",
        })
    }
}

/// Result of probing one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    pub value: Value,
    pub ambiguity: Option<Ambiguity>,
}

impl Recovery {
    fn exact(value: Value) -> Self {
        Self {
            value,
            ambiguity: None,
        }
    }

    fn lossy(value: Value, ambiguity: Ambiguity) -> Self {
        Self {
            value,
            ambiguity: Some(ambiguity),
        }
    }
}

/// Runs the probe sequence for `key`.
///
/// An absent key runs the full sequence and yields `Int(0)`; check
/// existence first when that matters.
///
/// # Errors
///
/// Returns an error if a probe fails.
pub fn probe(source: &dyn TypedProbe, key: &str) -> Result<Recovery> {
    let text = source.probe_string(key)?;
    if !text.is_empty() {
        if text.starts_with(SET_SENTINEL) {
            let items = source.probe_string_set(key)?.unwrap_or_default();
            return Ok(Recovery::exact(Value::set(items)));
        }
        return Ok(Recovery::exact(Value::String(text)));
    }

    if let Some(items) = source.probe_string_set(key)?
        && items.is_empty()
    {
        let float = source.probe_float(key)?;
        // bitwise zero, so -0.0 stays a float
        if float.to_bits() == 0 || float.is_nan() {
            let double = source.probe_double(key)?;
            return Ok(Recovery::lossy(Value::Double(double), Ambiguity::FloatZeroOrNan));
        }
        return Ok(Recovery::exact(Value::Float(float)));
    }

    let int = source.probe_int(key)?;
    let long = source.probe_long(key)?;
    if i64::from(int) != long {
        return Ok(Recovery::exact(Value::Long(long)));
    }
    Ok(match int {
        0 => Recovery::lossy(Value::Int(0), Ambiguity::IntZero),
        1 => Recovery::lossy(Value::Int(1), Ambiguity::IntOrBool),
        other => Recovery::exact(Value::Int(other)),
    })
}

/// Recovers the value of `key`, reporting ambiguities to `log` and
/// `tracing`.
///
/// # Errors
///
/// Returns an error if a probe fails.
pub fn recover(source: &dyn TypedProbe, key: &str, log: &dyn LogSink) -> Result<Value> {
    let recovery = probe(source, key)?;
    if let Some(ambiguity) = recovery.ambiguity {
        tracing::warn!(key, %ambiguity, "Lossy type recovery");
        log.on_log(&format!("KV.LossyTypeRecovery -> key: {key}, {ambiguity}"));
    }
    Ok(recovery.value)
}

/// Recovers every key the probe lists.
///
/// # Errors
///
/// Returns an error if listing keys or any probe fails.
pub fn recover_all(
    source: &dyn TypedProbe,
    log: &dyn LogSink,
) -> Result<BTreeMap<String, Value>> {
    source
        .keys()?
        .into_iter()
        .map(|key| {
            let value = recover(source, &key, log)?;
            Ok((key, value))
        })
        .collect()
}
