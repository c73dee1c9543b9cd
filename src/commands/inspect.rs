//! Whole-store commands.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use typedkv::heuristic::{self, Recovery};
use typedkv::{PackedStore, TypeDescriptor};

use super::{load_config, open_store, render};

pub fn list(config: Option<&Path>) -> Result<()> {
    let kv = open_store(config)?;
    let entries = kv.get_all()?;
    if entries.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    let width = entries.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in &entries {
        println!(
            "{key:<width$}  {:<16}  {}",
            TypeDescriptor::of(value)?.to_string(),
            render(value)?
        );
    }
    Ok(())
}

pub fn count(config: Option<&Path>) -> Result<()> {
    let kv = open_store(config)?;
    println!("{}", kv.count()?);
    Ok(())
}

pub fn clear(config: Option<&Path>, yes: bool) -> Result<()> {
    let kv = open_store(config)?;
    let total = kv.count()?;
    if total == 0 {
        println!("Store is already empty");
        return Ok(());
    }
    if !yes && !confirm(&format!("Remove all {total} entries?"))? {
        println!("Aborted");
        return Ok(());
    }
    if !kv.delete_all()? {
        anyhow::bail!("Failed to clear store (run with -v for details)");
    }
    println!("Removed {total} entries");
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Probes a packed store directly, bypassing envelopes and ciphers.
pub fn recover(path: &Path, key: Option<&str>) -> Result<()> {
    let store = PackedStore::open(path)?;
    let keys = match key {
        Some(key) => vec![key.to_string()],
        None => typedkv::TypedProbe::keys(&store)?,
    };
    for key in keys {
        let Recovery { value, ambiguity } = heuristic::probe(&store, &key)?;
        let note = ambiguity.map(|a| format!("  (ambiguous: {a})")).unwrap_or_default();
        println!("{key} = {} {}{note}", value.type_tag(), render(&value)?);
    }
    Ok(())
}

pub fn check(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let result = config.validate()?;
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    let backend = config
        .backend
        .open()
        .context("Configuration is valid but the backend could not be opened")?;
    println!(
        "OK: backend '{}' with {} entries",
        backend.name(),
        backend.count()?
    );
    Ok(())
}
