//! CLI command implementations.
//!
//! - [`entry`] - put, get, delete
//! - [`inspect`] - list, count, clear, recover, check

pub mod entry;
pub mod inspect;

use std::path::Path;

use anyhow::{Context, Result};
use typedkv::config::DEFAULT_CONFIG_FILE;
use typedkv::{JsonMarshaller, Kv, KvBuilder, KvConfig, Marshaller, TracingLog, Value};

/// Loads the explicit config, `./typedkv.toml`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<KvConfig> {
    match path {
        Some(path) => KvConfig::load_from(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => KvConfig::load(),
        None => Ok(KvConfig::default()),
    }
}

/// Opens the configured store with logging through `tracing`.
pub fn open_store(config: Option<&Path>) -> Result<Kv> {
    let config = load_config(config)?;
    let kv = KvBuilder::from_config(&config)
        .context("Failed to configure store")?
        .log_sink(TracingLog)
        .build()
        .context("Failed to open store")?;
    Ok(kv)
}

/// Renders a value as compact JSON for display.
pub fn render(value: &Value) -> Result<String> {
    JsonMarshaller
        .to_json(value)
        .context("Failed to render value")
}
