//! colony - inspect and edit persisted node state
//!
//! Persistent nodes keep their value in one JSON file per name. This binary
//! reads and writes those files through the same code paths the engine uses,
//! so a dictionary edited here is exactly what a restarted graph recovers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colony::{DictionaryNode, EngineConfig, Graph, PersistentVariable};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Colony - a reactive dataflow engine
#[derive(Parser)]
#[command(name = "colony")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config dir, colony/colony.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding persisted values (overrides the config)
    #[arg(long, global = true)]
    folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a persisted value
    Get { name: String },

    /// Overwrite a persisted value
    Set {
        name: String,
        /// New value as JSON
        value: String,
    },

    /// Work with a persisted dictionary
    Dict {
        name: String,
        #[command(subcommand)]
        action: DictAction,
    },
}

#[derive(Subcommand)]
enum DictAction {
    /// Print the mapping
    Show,

    /// Merge a JSON object into the mapping
    Update { entries: String },

    /// Remove keys from the mapping
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load_or_default(cli.config.as_deref());
    let _log_guard = colony::logging::init(&config.logging);

    let folder = cli
        .folder
        .unwrap_or_else(|| config.persistence.folder.clone());
    tracing::debug!("Using persistence folder {}", folder.display());

    match cli.command {
        Commands::Get { name } => get(&name, &folder),
        Commands::Set { name, value } => set(&name, &value, &folder),
        Commands::Dict { name, action } => dict(&name, action, &folder, &config),
    }
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("invalid JSON: {}", raw))
}

fn print_value(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn get(name: &str, folder: &Path) -> Result<()> {
    let variable: PersistentVariable = PersistentVariable::new(name, folder)?;
    match variable.get() {
        Some(value) => print_value(value),
        None => {
            eprintln!("{} is not set", variable.path().display());
            Ok(())
        }
    }
}

fn set(name: &str, raw: &str, folder: &Path) -> Result<()> {
    let value = parse_json(raw)?;
    let mut variable = PersistentVariable::new(name, folder)?;
    variable
        .set(value)
        .with_context(|| format!("failed to write {}", variable.path().display()))?;
    tracing::info!("Wrote {}", variable.path().display());
    Ok(())
}

fn dict(name: &str, action: DictAction, folder: &Path, config: &EngineConfig) -> Result<()> {
    let graph = Graph::with_config(config);
    let dictionary = DictionaryNode::new(&graph, name, folder)?;

    match action {
        DictAction::Show => {}
        DictAction::Update { entries } => match parse_json(&entries)? {
            Value::Object(map) => dictionary.update(map)?,
            other => anyhow::bail!("update expects a JSON object, got {}", other),
        },
        DictAction::Delete { keys } => dictionary.delete(keys)?,
    }

    print_value(&Value::Object(dictionary.value()?))
}
