//! Type descriptors: the metadata needed to decode a stored value.
//!
//! A descriptor is resolved once, at encode time, from the runtime shape of
//! a [`Value`] and travels next to the encoded string. Decoding never
//! inspects the target type at runtime; it only follows the descriptor.
//!
//! Descriptors nest, so a list of lists of ints is `list<list<int>>`. The
//! text form is what the envelope header stores:
//!
//! ```text
//! int   list<long>   set<?>   map<string,list<float>>   map<?,?>
//! ```
//!
//! `?` stands for an element type that is unknown because every container
//! at that position was empty.

use std::fmt;
use std::str::FromStr;

use crate::error::{KvError, Result};
use crate::value::{TypeTag, Value};

/// Shape of the outermost value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Scalar,
    List,
    Set,
    Map,
}

/// Minimal decode metadata for one stored value.
///
/// `List` and `Set` carry an element descriptor, `Map` carries key and value
/// descriptors together, `Scalar` carries only its own target tag. Empty
/// containers carry no element descriptor and decode to empty containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Scalar(TypeTag),
    List(Option<Box<TypeDescriptor>>),
    Set(Option<Box<TypeDescriptor>>),
    /// `(key, value)`
    Map(Option<(Box<TypeDescriptor>, Box<TypeDescriptor>)>),
}

impl From<TypeTag> for TypeDescriptor {
    fn from(tag: TypeTag) -> Self {
        Self::Scalar(tag)
    }
}

impl TypeDescriptor {
    pub fn list(element: impl Into<Self>) -> Self {
        Self::List(Some(Box::new(element.into())))
    }

    pub fn set(element: impl Into<Self>) -> Self {
        Self::Set(Some(Box::new(element.into())))
    }

    pub fn map(key: impl Into<Self>, value: impl Into<Self>) -> Self {
        Self::Map(Some((Box::new(key.into()), Box::new(value.into()))))
    }

    /// Resolves the descriptor for a runtime value.
    ///
    /// Element descriptors come from the container's contents. Empty inner
    /// containers adopt the element type of their non-empty siblings, so
    /// `[[1], []]` is `list<list<int>>`.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::MixedElements`] when the elements of one container
    /// (or the keys or values of one map) do not share a type, because such a
    /// value could not be decoded back to the same types.
    pub fn of(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::List(items) => Self::List(common(items.iter(), TypeTag::List)?.map(Box::new)),
            Value::Set(items) => Self::Set(common(items.iter(), TypeTag::Set)?.map(Box::new)),
            Value::Map(entries) => {
                let key = common(entries.iter().map(|(k, _)| k), TypeTag::Map)?;
                let value = common(entries.iter().map(|(_, v)| v), TypeTag::Map)?;
                Self::Map(key.zip(value).map(|(k, v)| (Box::new(k), Box::new(v))))
            },
            other => Self::Scalar(other.type_tag()),
        })
    }

    pub const fn kind(&self) -> ContainerKind {
        match self {
            Self::Scalar(_) => ContainerKind::Scalar,
            Self::List(_) => ContainerKind::List,
            Self::Set(_) => ContainerKind::Set,
            Self::Map(_) => ContainerKind::Map,
        }
    }

    /// Tag of the value this descriptor decodes to.
    pub const fn tag(&self) -> TypeTag {
        match self {
            Self::Scalar(tag) => *tag,
            Self::List(_) => TypeTag::List,
            Self::Set(_) => TypeTag::Set,
            Self::Map(_) => TypeTag::Map,
        }
    }

    /// Element descriptor of a list or set, value descriptor of a map.
    pub fn element(&self) -> Option<&Self> {
        match self {
            Self::Scalar(_) | Self::Map(None) => None,
            Self::List(element) | Self::Set(element) => element.as_deref(),
            Self::Map(Some((_, value))) => Some(value),
        }
    }

    /// Key descriptor of a map.
    pub fn key(&self) -> Option<&Self> {
        match self {
            Self::Map(Some((key, _))) => Some(key),
            _ => None,
        }
    }

    /// Element type of a list or set, value type of a map.
    pub fn element_type(&self) -> Option<TypeTag> {
        self.element().map(Self::tag)
    }

    /// Key type of a map.
    pub fn key_type(&self) -> Option<TypeTag> {
        self.key().map(Self::tag)
    }

    /// Target tag of a scalar.
    pub const fn scalar_type(&self) -> Option<TypeTag> {
        match self {
            Self::Scalar(tag) => Some(*tag),
            _ => None,
        }
    }

    /// Combines the descriptors of two sibling elements. `None` when they
    /// disagree.
    fn merge(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => (a == b).then_some(Self::Scalar(a)),
            (Self::List(a), Self::List(b)) => merge_element(a, b).map(Self::List),
            (Self::Set(a), Self::Set(b)) => merge_element(a, b).map(Self::Set),
            (Self::Map(None), Self::Map(entries)) | (Self::Map(entries), Self::Map(None)) => {
                Some(Self::Map(entries))
            },
            (Self::Map(Some((ka, va))), Self::Map(Some((kb, vb)))) => Some(Self::Map(Some((
                Box::new((*ka).merge(*kb)?),
                Box::new((*va).merge(*vb)?),
            )))),
            _ => None,
        }
    }
}

fn merge_element(
    a: Option<Box<TypeDescriptor>>,
    b: Option<Box<TypeDescriptor>>,
) -> Option<Option<Box<TypeDescriptor>>> {
    match (a, b) {
        (None, other) | (other, None) => Some(other),
        (Some(a), Some(b)) => (*a).merge(*b).map(|merged| Some(Box::new(merged))),
    }
}

fn common<'a>(
    items: impl Iterator<Item = &'a Value>,
    container: TypeTag,
) -> Result<Option<TypeDescriptor>> {
    let mut merged: Option<TypeDescriptor> = None;
    for item in items {
        let next = TypeDescriptor::of(item)?;
        merged = Some(match merged {
            None => next,
            Some(current) => current
                .merge(next)
                .ok_or(KvError::MixedElements(container))?,
        });
    }
    Ok(merged)
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Slot<'a>(Option<&'a TypeDescriptor>);

        impl fmt::Display for Slot<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.0 {
                    Some(descriptor) => write!(f, "{descriptor}"),
                    None => f.write_str("?"),
                }
            }
        }

        match self {
            Self::Scalar(tag) => write!(f, "{tag}"),
            Self::List(element) => write!(f, "list<{}>", Slot(element.as_deref())),
            Self::Set(element) => write!(f, "set<{}>", Slot(element.as_deref())),
            Self::Map(Some((key, value))) => write!(f, "map<{key},{value}>"),
            Self::Map(None) => f.write_str("map<?,?>"),
        }
    }
}

impl FromStr for TypeDescriptor {
    type Err = KvError;

    /// Parses the text form written by `Display`. A bare container tag such
    /// as `list` is a scalar descriptor that decodes to the marshaller's
    /// generic shape.
    fn from_str(s: &str) -> Result<Self> {
        let mut parser = Parser { rest: s };
        let descriptor = parser.descriptor()?;
        if !parser.rest.is_empty() {
            return Err(invalid(s, "trailing characters"));
        }
        Ok(descriptor)
    }
}

struct Parser<'a> {
    rest: &'a str,
}

impl Parser<'_> {
    fn descriptor(&mut self) -> Result<TypeDescriptor> {
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_lowercase())
            .unwrap_or(self.rest.len());
        let (name, rest) = self.rest.split_at(end);
        self.rest = rest;
        let tag: TypeTag = name.parse()?;
        if !self.eat('<') {
            return Ok(TypeDescriptor::Scalar(tag));
        }

        let descriptor = match tag {
            TypeTag::List => TypeDescriptor::List(self.slot()?.map(Box::new)),
            TypeTag::Set => TypeDescriptor::Set(self.slot()?.map(Box::new)),
            TypeTag::Map => {
                let key = self.slot()?;
                self.expect(',')?;
                let value = self.slot()?;
                match (key, value) {
                    (Some(key), Some(value)) => {
                        TypeDescriptor::Map(Some((Box::new(key), Box::new(value))))
                    },
                    (None, None) => TypeDescriptor::Map(None),
                    _ => return Err(invalid(name, "map needs both key and value types")),
                }
            },
            other => return Err(invalid(other.name(), "only containers take element types")),
        };
        self.expect('>')?;
        Ok(descriptor)
    }

    fn slot(&mut self) -> Result<Option<TypeDescriptor>> {
        if self.eat('?') {
            Ok(None)
        } else {
            self.descriptor().map(Some)
        }
    }

    fn eat(&mut self, c: char) -> bool {
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            },
            None => false,
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(invalid(self.rest, format!("expected '{c}'")))
        }
    }
}

fn invalid(near: &str, reason: impl fmt::Display) -> KvError {
    KvError::decode("type descriptor", format!("{reason} at '{near}'"))
}
