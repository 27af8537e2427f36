//! CLI tool for inspecting snapshot-backed stores.
//!
//! Provides commands for:
//! - Listing collections with their document counts
//! - Dumping or filtering a collection's documents as JSON
//! - Dropping a database

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use docmap_orm::DocmapConfig;
use docmap_store::{Database, DocumentStore, Filter, Operator};
use serde_json::Value;

/// Command-line arguments for the tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file with `[store]` and `[mapper]` tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory holding the snapshots (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Database name (overrides the config file)
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List collections and their document counts
    Collections,
    /// Print every document of a collection
    Dump { collection: String },
    /// Print documents where `field <op> value`
    Find {
        collection: String,
        field: String,
        /// JSON value; anything that does not parse is taken as a string
        value: String,
        #[arg(long, default_value = "=")]
        op: String,
    },
    /// Remove every collection of the database
    Drop {
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let config = load_config(&args)?;
    if config.store.data_dir.is_none() {
        bail!("no data directory configured; pass --data-dir or set store.data_dir");
    }
    let db = Database::connect(config.store.clone())
        .with_context(|| format!("Failed to open {}", config.store.connection_url()))?;
    tracing::debug!("Opened database {}", config.store.database);

    run(&db, args.command)
}

/// Reads the config file if given, then applies environment and
/// command-line overrides in that order.
fn load_config(args: &Args) -> anyhow::Result<DocmapConfig> {
    let mut config = match &args.config {
        Some(path) => DocmapConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => DocmapConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(data_dir) = &args.data_dir {
        config.store.data_dir = Some(data_dir.clone());
    }
    if let Some(database) = &args.database {
        config.store.database = database.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(db: &Database, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Collections => {
            for name in db.collection_names()? {
                println!("{}\t{}", name, db.document_count(&name));
            }
        }
        Command::Dump { collection } => {
            print_documents(&db.find(&collection, &Filter::new())?)?;
        }
        Command::Find {
            collection,
            field,
            value,
            op,
        } => {
            let op: Operator = op.parse()?;
            let filter = Filter::new().and(field, op, parse_value(&value));
            print_documents(&db.find(&collection, &filter)?)?;
        }
        Command::Drop { yes } => {
            if !yes {
                bail!("refusing to drop '{}' without --yes", db.config().database);
            }
            db.drop_database()?;
            tracing::info!("Dropped database {}", db.config().database);
        }
    }
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_documents(documents: &[docmap_store::Document]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(documents)?);
    Ok(())
}
