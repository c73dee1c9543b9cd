//! Value codec: typed values to strings and back.
//!
//! Encoding is a single marshaller call. Decoding is driven by the
//! [`TypeDescriptor`] stored with the value:
//!
//! - **Scalar**: the marshaller reads the text straight into the target tag.
//! - **List / Set**: the text is read as a generic list, then every element
//!   is re-encoded on its own and re-decoded against the element type.
//! - **Map**: the same two passes, applied to every key and every value.
//!
//! The second pass exists because the marshaller only ever targets one tag
//! per call; a container whose element type is known only at decode time
//! has to be rebuilt element by element. Element descriptors can themselves
//! be containers, in which case the second pass recurses.

mod marshaller;
mod serializer;


pub use marshaller::{JsonMarshaller, Marshaller};
pub use serializer::{HeaderSerializer, Serializer};

use crate::descriptor::TypeDescriptor;
use crate::error::{KvError, Result};
use crate::value::{TypeTag, Value};

/// Converts values to their stored string form and back.
pub trait Codec: Send + Sync {
    /// Encodes a value. `None` encodes to `None` and is never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the marshaller cannot encode the value.
    fn encode(&self, value: Option<&Value>) -> Result<Option<String>>;

    /// Decodes text written by [`Codec::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`KvError::MissingArgument`] without a descriptor and a
    /// decode error when the text does not match it.
    fn decode(&self, text: &str, descriptor: Option<&TypeDescriptor>) -> Result<Value>;
}

/// Descriptor-driven codec over a [`Marshaller`].
pub struct JsonCodec {
    marshaller: Box<dyn Marshaller>,
}

impl JsonCodec {
    pub fn new(marshaller: Box<dyn Marshaller>) -> Self {
        Self { marshaller }
    }

    /// Reads `text` as a generic container of the given structural shape.
    fn generic(&self, text: &str, shape: TypeTag) -> Result<Value> {
        self.marshaller.from_json(text, shape)
    }

    /// Second pass: re-encode one generic element and decode it against
    /// its own descriptor.
    fn retarget(&self, value: &Value, descriptor: &TypeDescriptor) -> Result<Value> {
        let json = self.marshaller.to_json(value)?;
        self.decode_as(&json, descriptor)
    }

    /// Structured map keys are written as their compact JSON text, so they
    /// are decoded from that text rather than re-encoded as a string.
    fn retarget_key(&self, key: &Value, descriptor: &TypeDescriptor) -> Result<Value> {
        match key {
            Value::String(text) if !matches!(descriptor, TypeDescriptor::Scalar(_)) => {
                self.decode_as(text, descriptor)
            },
            _ => self.retarget(key, descriptor),
        }
    }

    fn retarget_all(&self, items: Vec<Value>, element: &TypeDescriptor) -> Result<Vec<Value>> {
        items.iter().map(|item| self.retarget(item, element)).collect()
    }

    fn decode_as(&self, text: &str, descriptor: &TypeDescriptor) -> Result<Value> {
        match descriptor {
            TypeDescriptor::Scalar(tag) => self.marshaller.from_json(text, *tag),
            TypeDescriptor::List(None) => Ok(Value::List(Vec::new())),
            TypeDescriptor::Set(None) => Ok(Value::Set(Vec::new())),
            TypeDescriptor::Map(None) => Ok(Value::Map(Vec::new())),
            TypeDescriptor::List(Some(element)) => match self.generic(text, TypeTag::List)? {
                Value::List(items) => Ok(Value::List(self.retarget_all(items, element)?)),
                other => Err(KvError::type_mismatch(TypeTag::List, other.type_tag())),
            },
            TypeDescriptor::Set(Some(element)) => match self.generic(text, TypeTag::Set)? {
                Value::Set(items) => Ok(Value::set(self.retarget_all(items, element)?)),
                other => Err(KvError::type_mismatch(TypeTag::Set, other.type_tag())),
            },
            TypeDescriptor::Map(Some((key, value))) => match self.generic(text, TypeTag::Map)? {
                Value::Map(entries) => {
                    let entries = entries
                        .iter()
                        .map(|(k, v)| Ok((self.retarget_key(k, key)?, self.retarget(v, value)?)))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Value::map(entries))
                },
                other => Err(KvError::type_mismatch(TypeTag::Map, other.type_tag())),
            },
        }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new(Box::new(JsonMarshaller))
    }
}

impl Codec for JsonCodec {
    fn encode(&self, value: Option<&Value>) -> Result<Option<String>> {
        value.map(|v| self.marshaller.to_json(v)).transpose()
    }

    fn decode(&self, text: &str, descriptor: Option<&TypeDescriptor>) -> Result<Value> {
        let descriptor = descriptor.ok_or(KvError::MissingArgument("type descriptor"))?;
        self.decode_as(text, descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn round_trip(value: Value) -> Value {
        let codec = JsonCodec::default();
        let descriptor = TypeDescriptor::of(&value).unwrap();
        let text = codec.encode(Some(&value)).unwrap().unwrap();
        codec.decode(&text, Some(&descriptor)).unwrap()
    }

    #[test]
    fn test_none_encodes_to_none() {
        assert_eq!(JsonCodec::default().encode(None).unwrap(), None);
    }

    #[test]
    fn test_scalar_round_trips() {
        for value in [
            Value::from("hello"),
            Value::from(""),
            Value::Bool(true),
            Value::Int(i32::MIN),
            Value::Long(i64::MAX),
            Value::Float(3.14),
            Value::Float(f32::NAN),
            Value::Double(-2.5e-300),
            Value::Double(f64::INFINITY),
        ] {
            assert_eq!(round_trip(value.clone()), value);
        }
    }

    #[test]
    fn test_scalar_keeps_its_type() {
        // 7 as a long must not come back as an int or a double.
        assert_eq!(round_trip(Value::Long(7)), Value::Long(7));
        assert_eq!(round_trip(Value::Float(7.0)), Value::Float(7.0));
    }

    #[test]
    fn test_list_elements_are_retargeted() {
        let value = Value::from(vec![1i32, 2, 3]);
        let back = round_trip(value.clone());
        assert_eq!(back, value);
        let Value::List(items) = back else {
            panic!("expected list");
        };
        assert!(items.iter().all(|item| matches!(item, Value::Int(_))));
    }

    #[test]
    fn test_list_of_floats_not_doubles() {
        let value = Value::from(vec![0.5f32, 1.25]);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn test_set_round_trip_ignores_order() {
        let value = Value::from(HashSet::from(["b".to_string(), "a".to_string()]));
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn test_map_keys_and_values_retargeted() {
        let value = Value::from(HashMap::from([(1i32, 10i64), (2, 20)]));
        let back = round_trip(value.clone());
        assert_eq!(back, value);
        let Value::Map(entries) = back else {
            panic!("expected map");
        };
        assert!(
            entries
                .iter()
                .all(|(k, v)| matches!(k, Value::Int(_)) && matches!(v, Value::Long(_)))
        );
    }

    #[test]
    fn test_map_with_bool_keys() {
        let value = Value::map([(true, "yes"), (false, "no")]);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(round_trip(Value::List(vec![])), Value::List(vec![]));
        assert_eq!(round_trip(Value::Set(vec![])), Value::Set(vec![]));
        assert_eq!(round_trip(Value::Map(vec![])), Value::Map(vec![]));
    }

    #[test]
    fn test_list_of_objects() {
        let value = Value::List(vec![
            Value::Object(serde_json::json!({"name": "a", "tags": [1, 2]})),
            Value::Object(serde_json::json!({"name": "b", "tags": []})),
        ]);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn test_nested_lists_keep_inner_types() {
        let value = Value::from(vec![vec![1i32, 2], vec![3]]);
        let back = round_trip(value.clone());
        assert_eq!(back, value);
        let Value::List(rows) = back else {
            panic!("expected list");
        };
        for row in rows {
            let Value::List(cells) = row else {
                panic!("expected inner list");
            };
            assert!(cells.iter().all(|cell| matches!(cell, Value::Int(_))));
        }
    }

    #[test]
    fn test_map_of_float_lists() {
        let value = Value::map([("a", vec![1.5f32]), ("b", vec![])]);
        let back = round_trip(value.clone());
        assert_eq!(back, value);
        let Value::Map(entries) = back else {
            panic!("expected map");
        };
        assert!(entries.iter().all(|(_, v)| match v {
            Value::List(items) => items.iter().all(|item| matches!(item, Value::Float(_))),
            _ => false,
        }));
    }

    #[test]
    fn test_deeply_nested_containers() {
        let inner = Value::map([("inner", vec![vec![2.5f32]])]);
        for value in [
            Value::List(vec![Value::from(HashSet::from([1i64, 2])), Value::Set(vec![])]),
            Value::List(vec![Value::map([(1i32, true)]), Value::Map(vec![])]),
            Value::map([(vec![1i32, 2], "pair"), (vec![], "none")]),
            Value::map([("outer", inner)]),
        ] {
            assert_eq!(round_trip(value.clone()), value, "{value:?}");
        }
    }

    #[test]
    fn test_missing_descriptor() {
        let err = JsonCodec::default().decode("1", None).unwrap_err();
        assert!(matches!(err, KvError::MissingArgument("type descriptor")));
    }

    #[test]
    fn test_descriptor_mismatch_is_decode_error() {
        let codec = JsonCodec::default();
        let descriptor = TypeDescriptor::list(TypeTag::Int);
        assert!(codec.decode("{\"a\":1}", Some(&descriptor)).is_err());
        assert!(codec.decode("[\"x\"]", Some(&descriptor)).is_err());
    }
}
