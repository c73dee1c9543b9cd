//! Single-key commands.

use std::path::Path;

use anyhow::{Context, Result};
use typedkv::{JsonMarshaller, Marshaller, TypeDescriptor, TypeTag, Value};

use super::{open_store, render};

/// Parses command-line text as a value of `tag`.
fn parse_value(text: &str, tag: TypeTag) -> Result<Value> {
    if tag == TypeTag::String {
        return Ok(Value::from(text));
    }
    JsonMarshaller
        .from_json(text, tag)
        .with_context(|| format!("'{text}' is not a valid {tag}"))
}

pub fn put(config: Option<&Path>, key: &str, text: &str, type_tag: &str) -> Result<()> {
    let tag: TypeTag = type_tag.parse()?;
    let value = parse_value(text, tag)?;
    let descriptor = TypeDescriptor::of(&value)?;

    let kv = open_store(config)?;
    if !kv.put(key, value)? {
        anyhow::bail!("Failed to store '{key}' (run with -v for details)");
    }
    println!("Stored {key} ({descriptor})");
    Ok(())
}

pub fn get(config: Option<&Path>, key: &str) -> Result<()> {
    let kv = open_store(config)?;
    match kv.get(key)? {
        Some(value) => {
            println!("{} = {}", TypeDescriptor::of(&value)?, render(&value)?);
            Ok(())
        },
        None => anyhow::bail!("Key not found or unreadable: {key}"),
    }
}

pub fn delete(config: Option<&Path>, key: &str) -> Result<()> {
    let kv = open_store(config)?;
    if kv.delete(key)? {
        println!("Deleted {key}");
    } else {
        println!("No such key: {key}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_by_tag() {
        assert_eq!(parse_value("42", TypeTag::Int).unwrap(), Value::Int(42));
        assert_eq!(parse_value("42", TypeTag::String).unwrap(), Value::from("42"));
        assert_eq!(parse_value("true", TypeTag::Bool).unwrap(), Value::Bool(true));
        assert_eq!(
            parse_value("[\"a\",\"b\",\"a\"]", TypeTag::Set).unwrap(),
            Value::set(["a", "b"])
        );
        assert!(parse_value("x", TypeTag::Long).is_err());
    }
}
