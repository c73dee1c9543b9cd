//! Dynamically typed values and their type tags.
//!
//! Every backend stores strings, so the original type of a value has to be
//! carried (or recovered) explicitly. [`Value`] is the tagged union the
//! façade accepts and returns; [`TypeTag`] names one of its variants and is
//! the unit the type descriptor and the marshaller work with.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{KvError, Result};

/// Identifies one primitive or structural value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    String,
    Bool,
    Int,
    Long,
    Float,
    Double,
    List,
    Set,
    Map,
    Object,
}

impl TypeTag {
    /// All tags, in declaration order.
    pub const ALL: [TypeTag; 10] = [
        Self::String,
        Self::Bool,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::List,
        Self::Set,
        Self::Map,
        Self::Object,
    ];

    /// Stable name used in stored envelopes and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::Object => "object",
        }
    }

    /// Returns true for list, set and map.
    pub const fn is_container(self) -> bool {
        matches!(self, Self::List | Self::Set | Self::Map)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeTag {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.name() == s)
            .ok_or_else(|| KvError::decode("type tag", format!("unknown tag '{s}'")))
    }
}

/// A typed value as seen by callers of the façade.
///
/// Sets keep their elements unique and maps keep their keys unique when
/// built through [`Value::set`] and [`Value::map`]. Equality is structural:
/// sets and maps compare without regard to order, and NaN compares equal to
/// NaN so a stored value always equals the value read back.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Opaque structured object, kept in its JSON form.
    Object(serde_json::Value),
}

impl Value {
    /// Returns the tag of this value's variant.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::String(_) => TypeTag::String,
            Self::Bool(_) => TypeTag::Bool,
            Self::Int(_) => TypeTag::Int,
            Self::Long(_) => TypeTag::Long,
            Self::Float(_) => TypeTag::Float,
            Self::Double(_) => TypeTag::Double,
            Self::List(_) => TypeTag::List,
            Self::Set(_) => TypeTag::Set,
            Self::Map(_) => TypeTag::Map,
            Self::Object(_) => TypeTag::Object,
        }
    }

    /// Builds a set, dropping duplicate elements.
    pub fn set<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            let item = item.into();
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Self::Set(out)
    }

    /// Builds a map; a repeated key keeps the last value.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (key, value) in entries {
            let (key, value) = (key.into(), value.into());
            match out.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
        Self::Map(out)
    }

    /// Wraps any serializable type as an opaque object value.
    pub fn object<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Object)
            .map_err(|e| KvError::encode("object", e))
    }

    /// Deserializes an object value back into `T`.
    pub fn into_object<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Object(json) => {
                serde_json::from_value(json).map_err(|e| KvError::decode("object", e))
            },
            other => Err(KvError::type_mismatch(TypeTag::Object, other.type_tag())),
        }
    }

    /// Converts a list or set into a vector of `T`.
    pub fn into_vec<T>(self) -> Result<Vec<T>>
    where
        T: TryFrom<Value, Error = KvError>,
    {
        match self {
            Self::List(items) | Self::Set(items) => items.into_iter().map(T::try_from).collect(),
            other => Err(KvError::type_mismatch(TypeTag::List, other.type_tag())),
        }
    }

    /// Converts a set or list into a `HashSet<T>`.
    pub fn into_hash_set<T>(self) -> Result<HashSet<T>>
    where
        T: TryFrom<Value, Error = KvError> + Eq + Hash,
    {
        match self {
            Self::List(items) | Self::Set(items) => items.into_iter().map(T::try_from).collect(),
            other => Err(KvError::type_mismatch(TypeTag::Set, other.type_tag())),
        }
    }

    /// Converts a map into a `HashMap<K, V>`.
    pub fn into_hash_map<K, V>(self) -> Result<HashMap<K, V>>
    where
        K: TryFrom<Value, Error = KvError> + Eq + Hash,
        V: TryFrom<Value, Error = KvError>,
    {
        match self {
            Self::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((K::try_from(k)?, V::try_from(v)?)))
                .collect(),
            other => Err(KvError::type_mismatch(TypeTag::Map, other.type_tag())),
        }
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Double(a), Self::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a.len() == b.len() && a.iter().all(|x| b.contains(x)),
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(bk, bv)| bk == k && bv == v))
            },
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! scalar_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = KvError;

                fn try_from(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(KvError::type_mismatch(TypeTag::$variant, other.type_tag())),
                    }
                }
            }
        )*
    };
}

scalar_conversions! {
    String => String,
    bool => Bool,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<HashSet<T>> for Value {
    fn from(items: HashSet<T>) -> Self {
        Self::set(items)
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(items: BTreeSet<T>) -> Self {
        Self::set(items)
    }
}

impl<K: Into<Value>, V: Into<Value>> From<HashMap<K, V>> for Value {
    fn from(entries: HashMap<K, V>) -> Self {
        Self::map(entries)
    }
}

impl<K: Into<Value>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(entries: BTreeMap<K, V>) -> Self {
        Self::map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names_round_trip() {
        for tag in TypeTag::ALL {
            assert_eq!(tag.name().parse::<TypeTag>().unwrap(), tag);
        }
        assert!("uuid".parse::<TypeTag>().is_err());
    }

    #[test]
    fn test_set_ignores_order_and_duplicates() {
        let a = Value::set(["x", "y", "x"]);
        let b = Value::set(["y", "x"]);
        assert_eq!(a, b);
        let Value::Set(items) = a else {
            panic!("expected set");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_list_is_ordered() {
        assert_ne!(Value::from(vec![1i32, 2]), Value::from(vec![2i32, 1]));
    }

    #[test]
    fn test_map_last_key_wins() {
        let map = Value::map([("a", 1i32), ("b", 2), ("a", 3)]);
        assert_eq!(map, Value::map([("b", 2i32), ("a", 3)]));
    }

    #[test]
    fn test_nan_equals_nan() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_eq!(Value::Float(f32::NAN), Value::Float(f32::NAN));
        assert_ne!(Value::Float(1.0), Value::Double(1.0));
    }

    #[test]
    fn test_scalar_try_from() {
        assert_eq!(i32::try_from(Value::Int(7)).unwrap(), 7);
        let err = i64::try_from(Value::Int(7)).unwrap_err();
        assert!(matches!(
            err,
            KvError::TypeMismatch {
                expected: TypeTag::Long,
                found: TypeTag::Int
            }
        ));
    }

    #[test]
    fn test_container_conversions() {
        let list = Value::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(list.into_vec::<String>().unwrap(), vec!["a", "b"]);

        let map = Value::from(HashMap::from([("k".to_string(), 1i64)]));
        let back: HashMap<String, i64> = map.into_hash_map().unwrap();
        assert_eq!(back.get("k"), Some(&1));
    }

    #[test]
    fn test_object_round_trip() {
        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Point {
            x: i32,
            y: i32,
        }

        let value = Value::object(&Point { x: 1, y: -2 }).unwrap();
        assert_eq!(value.type_tag(), TypeTag::Object);
        assert_eq!(value.into_object::<Point>().unwrap(), Point { x: 1, y: -2 });
    }
}
