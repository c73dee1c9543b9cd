//! `typedkv` command-line tool: inspect and edit a typed store.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "typedkv")]
#[command(about = "Inspect and edit typed key-value stores", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./typedkv.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value
    Put {
        key: String,
        /// Value text; JSON for list, set, map and object
        value: String,
        /// Type of the value
        #[arg(short = 't', long = "type", default_value = "string")]
        type_tag: String,
    },

    /// Print a value and its type
    Get { key: String },

    /// Print every entry
    List,

    /// Remove a key
    Delete { key: String },

    /// Remove every entry
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the number of entries
    Count,

    /// Recover types from a packed primitive store by probing
    Recover {
        /// Packed store file
        path: PathBuf,
        /// Only this key
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Validate the configuration
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Put {
            key,
            value,
            type_tag,
        } => commands::entry::put(config, &key, &value, &type_tag),
        Commands::Get { key } => commands::entry::get(config, &key),
        Commands::Delete { key } => commands::entry::delete(config, &key),
        Commands::List => commands::inspect::list(config),
        Commands::Count => commands::inspect::count(config),
        Commands::Clear { yes } => commands::inspect::clear(config, yes),
        Commands::Recover { path, key } => commands::inspect::recover(&path, key.as_deref()),
        Commands::Check => commands::inspect::check(config),
    }
}

/// Logs go to stderr so command output stays pipeable.
fn init_logging(verbose: u8, json: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
