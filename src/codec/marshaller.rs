//! JSON marshalling of [`Value`]s.
//!
//! The marshaller is the opaque `to_json` / `from_json` capability the codec
//! is built on. `from_json` targets a single [`TypeTag`]; structural tags
//! produce the marshaller's natural generic shape (lists of longs, doubles,
//! strings and maps keyed by strings), which the codec then re-targets one
//! element at a time.

use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::error::{KvError, Result};
use crate::value::{TypeTag, Value};

/// Converts values to JSON text and back.
pub trait Marshaller: Send + Sync {
    /// Serializes a value to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the value has no JSON representation.
    fn to_json(&self, value: &Value) -> Result<String>;

    /// Parses JSON text into a value of the given shape.
    ///
    /// # Errors
    ///
    /// Returns a decode error on malformed input or when the JSON cannot be
    /// read as `shape`.
    fn from_json(&self, json: &str, shape: TypeTag) -> Result<Value>;
}

/// Default marshaller over `serde_json`.
///
/// Scalars are read leniently: numbers and booleans may arrive as JSON
/// strings, which is how map keys come back after a round-trip. Non-finite
/// floats are written as the strings `"NaN"`, `"Infinity"` and
/// `"-Infinity"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl Marshaller for JsonMarshaller {
    fn to_json(&self, value: &Value) -> Result<String> {
        serde_json::to_string(&to_json_value(value)?).map_err(|e| KvError::encode("json", e))
    }

    fn from_json(&self, json: &str, shape: TypeTag) -> Result<Value> {
        let parsed: Json = serde_json::from_str(json).map_err(|e| KvError::decode("json", e))?;
        shape_value(parsed, shape)
    }
}

fn to_json_value(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::String(s) => Json::String(s.clone()),
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Long(l) => Json::from(*l),
        Value::Float(f) => float_json(*f),
        Value::Double(d) => double_json(*d),
        Value::List(items) | Value::Set(items) => {
            Json::Array(items.iter().map(to_json_value).collect::<Result<_>>()?)
        },
        Value::Map(entries) => {
            let mut object = JsonMap::with_capacity(entries.len());
            for (key, value) in entries {
                object.insert(key_text(key)?, to_json_value(value)?);
            }
            Json::Object(object)
        },
        Value::Object(json) => json.clone(),
    })
}

// Shortest decimal form of the f32, so 3.14f32 is written as 3.14.
fn float_json(f: f32) -> Json {
    if !f.is_finite() {
        return Json::String(non_finite_text(f64::from(f)).to_string());
    }
    f.to_string()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Json::from(f64::from(f)), Json::Number)
}

fn double_json(d: f64) -> Json {
    Number::from_f64(d).map_or_else(|| Json::String(non_finite_text(d).to_string()), Json::Number)
}

fn non_finite_text(d: f64) -> &'static str {
    if d.is_nan() {
        "NaN"
    } else if d.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

/// JSON object keys are strings; scalars use their JSON text, structured
/// keys their compact JSON.
fn key_text(key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        other => match to_json_value(other)? {
            Json::String(s) => Ok(s),
            json => Ok(json.to_string()),
        },
    }
}

fn shape_value(json: Json, shape: TypeTag) -> Result<Value> {
    match shape {
        TypeTag::String => match json {
            Json::String(s) => Ok(Value::String(s)),
            Json::Number(n) => Ok(Value::String(n.to_string())),
            Json::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(mismatch(shape, &other)),
        },
        TypeTag::Bool => match json {
            Json::Bool(b) => Ok(Value::Bool(b)),
            Json::String(s) => s
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|e| KvError::decode("bool", e)),
            other => Err(mismatch(shape, &other)),
        },
        TypeTag::Int => {
            let wide = integer(&json, shape)?;
            i32::try_from(wide)
                .map(Value::Int)
                .map_err(|_| KvError::decode("int", format!("{wide} is out of range")))
        },
        TypeTag::Long => integer(&json, shape).map(Value::Long),
        // f64 -> f32 rounds to the nearest float, which recovers the value
        // written by float_json.
        TypeTag::Float => real(&json, shape).map(|d| Value::Float(d as f32)),
        TypeTag::Double => real(&json, shape).map(Value::Double),
        TypeTag::List | TypeTag::Set => match json {
            Json::Array(items) => {
                let items: Vec<Value> = items.into_iter().map(natural).collect();
                Ok(if shape == TypeTag::Set {
                    Value::set(items)
                } else {
                    Value::List(items)
                })
            },
            other => Err(mismatch(shape, &other)),
        },
        TypeTag::Map => match json {
            Json::Object(object) => Ok(Value::Map(
                object
                    .into_iter()
                    .map(|(k, v)| (Value::String(k), natural(v)))
                    .collect(),
            )),
            other => Err(mismatch(shape, &other)),
        },
        TypeTag::Object => Ok(Value::Object(json)),
    }
}

/// The marshaller's own idea of a JSON value, with no target type.
fn natural(json: Json) -> Value {
    match json {
        Json::Null => Value::Object(Json::Null),
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(l) => Value::Long(l),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::List(items.into_iter().map(natural).collect()),
        Json::Object(object) => Value::Map(
            object
                .into_iter()
                .map(|(k, v)| (Value::String(k), natural(v)))
                .collect(),
        ),
    }
}

fn integer(json: &Json, shape: TypeTag) -> Result<i64> {
    match json {
        Json::Number(n) => {
            if let Some(l) = n.as_i64() {
                return Ok(l);
            }
            match n.as_f64() {
                Some(d) if d.fract() == 0.0 && d.abs() < 9.2e18 => Ok(d as i64),
                _ => Err(KvError::decode(shape.name(), format!("{n} is not an integer"))),
            }
        },
        Json::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| KvError::decode(shape.name(), format!("'{s}': {e}"))),
        other => Err(mismatch(shape, other)),
    }
}

fn real(json: &Json, shape: TypeTag) -> Result<f64> {
    match json {
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| KvError::decode(shape.name(), format!("{n} is not a number"))),
        Json::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            text => text
                .trim()
                .parse::<f64>()
                .map_err(|e| KvError::decode(shape.name(), format!("'{s}': {e}"))),
        },
        other => Err(mismatch(shape, other)),
    }
}

fn mismatch(shape: TypeTag, json: &Json) -> KvError {
    let found = match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    };
    KvError::decode(shape.name(), format!("cannot read JSON {found} as {shape}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(value: &Value) -> String {
        JsonMarshaller.to_json(value).unwrap()
    }

    #[test]
    fn test_float_written_in_shortest_form() {
        assert_eq!(json(&Value::Float(3.14)), "3.14");
        assert_eq!(json(&Value::Double(0.1)), "0.1");
    }

    #[test]
    fn test_non_finite_written_as_strings() {
        assert_eq!(json(&Value::Double(f64::NAN)), "\"NaN\"");
        assert_eq!(json(&Value::Float(f32::NEG_INFINITY)), "\"-Infinity\"");
        let back = JsonMarshaller.from_json("\"Infinity\"", TypeTag::Double).unwrap();
        assert_eq!(back, Value::Double(f64::INFINITY));
    }

    #[test]
    fn test_map_keys_are_stringified() {
        let map = Value::map([(1i32, "one"), (2, "two")]);
        let text = json(&map);
        assert!(text.contains("\"1\":\"one\""));
        assert!(text.contains("\"2\":\"two\""));
    }

    #[test]
    fn test_lenient_scalar_reads() {
        let m = JsonMarshaller;
        assert_eq!(m.from_json("\"42\"", TypeTag::Int).unwrap(), Value::Int(42));
        assert_eq!(m.from_json("\"true\"", TypeTag::Bool).unwrap(), Value::Bool(true));
        assert_eq!(m.from_json("3.0", TypeTag::Int).unwrap(), Value::Int(3));
        assert_eq!(m.from_json("7", TypeTag::String).unwrap(), Value::from("7"));
    }

    #[test]
    fn test_int_out_of_range_is_decode_error() {
        let err = JsonMarshaller.from_json("2147483648", TypeTag::Int).unwrap_err();
        assert!(matches!(err, KvError::Decode { what: "int", .. }));
    }

    #[test]
    fn test_generic_list_uses_natural_shapes() {
        let value = JsonMarshaller.from_json("[1, 2.5, \"x\", {\"k\": 1}]", TypeTag::List).unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Long(1),
                Value::Double(2.5),
                Value::from("x"),
                Value::map([("k", 1i64)]),
            ])
        );
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let err = JsonMarshaller.from_json("{not json", TypeTag::Map).unwrap_err();
        assert!(matches!(err, KvError::Decode { what: "json", .. }));
    }

    #[test]
    fn test_null_rejected_for_scalars() {
        assert!(JsonMarshaller.from_json("null", TypeTag::Long).is_err());
        assert_eq!(
            JsonMarshaller.from_json("null", TypeTag::Object).unwrap(),
            Value::Object(Json::Null)
        );
    }
}
