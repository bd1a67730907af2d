//! Cairn CLI - Command-line interface for inspecting and editing cairn stores

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the environment directory
    #[arg(short, long, default_value = "./data")]
    env_path: PathBuf,

    /// Maximum number of named stores in the environment
    #[arg(long, default_value_t = 64)]
    max_stores: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show entry counts for one store or every store
    Stats {
        /// Store to report on (all stores when omitted)
        store: Option<String>,
    },

    /// List keys in a store
    Keys {
        store: String,

        /// First position to list (inclusive)
        #[arg(long)]
        start: Option<usize>,

        /// Last position to list (exclusive)
        #[arg(long)]
        end: Option<usize>,
    },

    /// Print the JSON value stored under a key
    Get {
        store: String,
        key: String,

        /// Write the attachment, if any, to this file
        #[arg(long)]
        attachment_out: Option<PathBuf>,
    },

    /// Store a JSON value under a key
    Put {
        store: String,
        key: String,

        /// JSON text of the value
        json: String,

        /// File whose bytes become the attachment
        #[arg(long)]
        attachment: Option<PathBuf>,
    },

    /// Delete a key and print its previous value
    Remove { store: String, key: String },

    /// List keys whose key or JSON value contains a substring
    Grep {
        store: String,
        pattern: String,

        /// Also search JSON values, and print them
        #[arg(long)]
        values: bool,

        /// Stop after this many matches
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete every entry in a store
    Drop {
        store: String,

        /// Confirm the drop; without it nothing is deleted
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = cairn::EnvironmentRegistry::new();
    let env = commands::open_env(&registry, cli.env_path, cli.max_stores)?;

    // Execute command
    match cli.command {
        Commands::Stats { store } => {
            commands::stats::execute(&env, store.as_deref())?;
        }
        Commands::Keys { store, start, end } => {
            commands::keys::execute(&env, &store, start, end)?;
        }
        Commands::Get {
            store,
            key,
            attachment_out,
        } => {
            commands::get::execute(&env, &store, &key, attachment_out)?;
        }
        Commands::Put {
            store,
            key,
            json,
            attachment,
        } => {
            commands::put::execute(&env, &store, &key, &json, attachment)?;
        }
        Commands::Remove { store, key } => {
            commands::remove::execute(&env, &store, &key)?;
        }
        Commands::Grep {
            store,
            pattern,
            values,
            limit,
        } => {
            commands::grep::execute(&env, &store, &pattern, values, limit)?;
        }
        Commands::Drop { store, yes } => {
            commands::drop::execute(&env, &store, yes)?;
        }
    }

    registry.close_all()?;
    Ok(())
}
