//! Stored envelope: type descriptor header plus encrypted payload.
//!
//! Backends keep a single string per key, so the descriptor is written in
//! front of the ciphertext:
//!
//! ```text
//! <first tag>#<second tag>#<kind>V@<payload>
//! ```
//!
//! `kind` is `0` scalar, `1` list, `2` map, `3` set. The first field is the
//! scalar tag, the element descriptor, or the map key descriptor; the second
//! is the map value descriptor. Nested descriptors use their text form, so
//! a list of lists of ints is stored as `list<int>##1V@<payload>`. Absent
//! descriptors are left empty, so an empty list is stored as
//! `##1V@<payload>`.

use crate::descriptor::TypeDescriptor;
use crate::error::{KvError, Result};

const INFO_DELIMITER: char = '#';
const VERSION_MARKER: char = 'V';
const PAYLOAD_DELIMITER: char = '@';

/// Joins a descriptor and a payload into one stored string, and splits
/// them back apart.
pub trait Serializer: Send + Sync {
    fn serialize(&self, payload: &str, descriptor: &TypeDescriptor) -> String;

    /// # Errors
    ///
    /// Returns a decode error when `stored` carries no valid header.
    fn deserialize(&self, stored: &str) -> Result<(TypeDescriptor, String)>;
}

/// Default envelope serializer using the header layout above.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderSerializer;

impl Serializer for HeaderSerializer {
    fn serialize(&self, payload: &str, descriptor: &TypeDescriptor) -> String {
        let (first, second, kind) = match descriptor {
            TypeDescriptor::Scalar(tag) => (Some(tag.name().to_string()), None, '0'),
            TypeDescriptor::List(element) => (element.as_ref().map(|e| e.to_string()), None, '1'),
            TypeDescriptor::Map(Some((key, value))) => {
                (Some(key.to_string()), Some(value.to_string()), '2')
            },
            TypeDescriptor::Map(None) => (None, None, '2'),
            TypeDescriptor::Set(element) => (element.as_ref().map(|e| e.to_string()), None, '3'),
        };
        format!(
            "{}{INFO_DELIMITER}{}{INFO_DELIMITER}{kind}{VERSION_MARKER}{PAYLOAD_DELIMITER}{payload}",
            first.unwrap_or_default(),
            second.unwrap_or_default(),
        )
    }

    fn deserialize(&self, stored: &str) -> Result<(TypeDescriptor, String)> {
        let (header, payload) = stored
            .split_once(PAYLOAD_DELIMITER)
            .ok_or_else(|| invalid("no payload delimiter"))?;
        let info = header
            .strip_suffix(VERSION_MARKER)
            .ok_or_else(|| invalid("unsupported header version"))?;

        let mut parts = info.splitn(3, INFO_DELIMITER);
        let (Some(first), Some(second), Some(kind)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected three header fields"));
        };
        let first = optional_descriptor(first)?;
        let second = optional_descriptor(second)?;

        let descriptor = match (kind, first, second) {
            ("0", Some(TypeDescriptor::Scalar(tag)), None) => TypeDescriptor::Scalar(tag),
            ("1", element, None) => TypeDescriptor::List(element.map(Box::new)),
            ("3", element, None) => TypeDescriptor::Set(element.map(Box::new)),
            ("2", Some(key), Some(value)) => {
                TypeDescriptor::Map(Some((Box::new(key), Box::new(value))))
            },
            ("2", None, None) => TypeDescriptor::Map(None),
            _ => return Err(invalid(format!("inconsistent header '{header}'"))),
        };
        Ok((descriptor, payload.to_string()))
    }
}

fn optional_descriptor(field: &str) -> Result<Option<TypeDescriptor>> {
    if field.is_empty() {
        Ok(None)
    } else {
        field
            .parse()
            .map(Some)
            .map_err(|_| invalid(format!("unknown descriptor '{field}'")))
    }
}

fn invalid(reason: impl ToString) -> KvError {
    KvError::decode("envelope", reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypeTag;

    #[test]
    fn test_header_layout() {
        let s = HeaderSerializer;
        assert_eq!(
            s.serialize("abc", &TypeDescriptor::Scalar(TypeTag::Int)),
            "int##0V@abc"
        );
        assert_eq!(
            s.serialize("x", &TypeDescriptor::map(TypeTag::String, TypeTag::Long)),
            "string#long#2V@x"
        );
        assert_eq!(s.serialize("", &TypeDescriptor::List(None)), "##1V@");
        assert_eq!(
            s.serialize("", &TypeDescriptor::list(TypeDescriptor::list(TypeTag::Int))),
            "list<int>##1V@"
        );
    }

    #[test]
    fn test_every_descriptor_shape_parses_back() {
        let s = HeaderSerializer;
        for descriptor in [
            TypeDescriptor::Scalar(TypeTag::Object),
            TypeDescriptor::list(TypeTag::Double),
            TypeDescriptor::Set(None),
            TypeDescriptor::set(TypeTag::String),
            TypeDescriptor::Map(None),
            TypeDescriptor::map(TypeTag::Int, TypeTag::Bool),
            TypeDescriptor::list(TypeDescriptor::Set(None)),
            TypeDescriptor::map(
                TypeDescriptor::list(TypeTag::Int),
                TypeDescriptor::map(TypeTag::String, TypeDescriptor::set(TypeTag::Float)),
            ),
        ] {
            let stored = s.serialize("pay@load#", &descriptor);
            let (back, payload) = s.deserialize(&stored).unwrap();
            assert_eq!(back, descriptor);
            assert_eq!(payload, "pay@load#");
        }
    }

    #[test]
    fn test_rejects_raw_strings() {
        let s = HeaderSerializer;
        for stored in [
            "hello",
            "int##0@x",
            "int#0V@x",
            "uuid##0V@x",
            "##0V@x",
            "int##2V@x",
            "list<int>##0V@x",
            "list<int##1V@x",
        ] {
            assert!(
                matches!(s.deserialize(stored), Err(KvError::Decode { what: "envelope", .. })),
                "{stored} should be rejected"
            );
        }
    }
}
