//! Tideline CLI
//!
//! Command-line tools for inspecting and maintaining a file-backed Tideline
//! store.
//!
//! # Commands
//!
//! - `inspect` - Display queue statistics, mirror tables and connectivity
//! - `pending` - List unprocessed queue items
//! - `mirror` - Show mirrored records of a table
//! - `compact` - Remove processed items from the queue
//! - `retry` - Clear recorded errors so failing items look fresh

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tideline command-line store tools.
#[derive(Parser)]
#[command(name = "tideline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display queue statistics, mirror tables and connectivity
    Inspect,

    /// List unprocessed queue items in replay order
    Pending {
        /// Maximum number of items to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only list items carrying an error
        #[arg(short, long)]
        errors: bool,
    },

    /// Show mirrored records of a table
    Mirror {
        /// Table name
        table: String,

        /// Only show this record
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Remove processed items from the queue
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Clear recorded errors of pending items
    Retry,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, cli.format)?;
        }
        Commands::Pending { limit, errors } => {
            let path = cli.path.ok_or("Store path required for pending")?;
            commands::pending::run(&path, limit, errors, cli.format)?;
        }
        Commands::Mirror { table, key } => {
            let path = cli.path.ok_or("Store path required for mirror")?;
            commands::mirror::run(&path, &table, key.as_deref(), cli.format)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path, dry_run, cli.format)?;
        }
        Commands::Retry => {
            let path = cli.path.ok_or("Store path required for retry")?;
            commands::retry::run(&path, cli.format)?;
        }
        Commands::Version => {
            println!("Tideline CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Tideline store format v{}",
                tideline_core::codec::FORMAT_VERSION
            );
        }
    }

    Ok(())
}
