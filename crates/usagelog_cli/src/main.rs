//! Usagelog CLI
//!
//! Command-line tools for usagelog telemetry replication.
//!
//! # Commands
//!
//! - `create-schema` - Provision the server tables in a SQLite file
//! - `drop-schema` - Remove the server tables
//! - `replicate` - Merge a packed device payload into the server
//! - `inspect` - Summarize a packed payload
//! - `pack` - Pack a JSON snapshot into a wire payload

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use usagelog_store::SchemaProfile;

/// Usagelog telemetry replication tools.
#[derive(Parser)]
#[command(name = "usagelog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the server tables
    CreateSchema {
        /// Path to the server database file
        #[arg(long)]
        db: PathBuf,

        /// Omit UserId/VersionId from fact tables
        #[arg(long)]
        untagged: bool,
    },

    /// Drop the server tables
    DropSchema {
        /// Path to the server database file
        #[arg(long)]
        db: PathBuf,
    },

    /// Replicate a packed device payload
    Replicate {
        /// Path to the server database file
        #[arg(long)]
        db: PathBuf,

        /// Name of the replicating user
        #[arg(long)]
        user: String,

        /// Application version reported by the device
        #[arg(long = "app-version")]
        app_version: String,

        /// Path to the packed payload
        #[arg(long)]
        payload: PathBuf,

        /// Fact rows per insert statement
        #[arg(long)]
        batch_size: Option<usize>,

        /// Abort the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// The server uses the untagged fact layout
        #[arg(long)]
        untagged: bool,
    },

    /// Summarize a packed payload
    Inspect {
        /// Path to the packed payload
        #[arg(long)]
        payload: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Pack a JSON snapshot into a wire payload
    Pack {
        /// Path to the JSON snapshot
        #[arg(long)]
        input: PathBuf,

        /// Path of the payload to write
        #[arg(long)]
        output: PathBuf,
    },

    /// Show version information
    Version,
}

fn profile(untagged: bool) -> SchemaProfile {
    if untagged {
        SchemaProfile::Untagged
    } else {
        SchemaProfile::Tagged
    }
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
        Commands::CreateSchema { db, untagged } => {
            commands::schema::create(&db, profile(untagged))?;
        }
        Commands::DropSchema { db } => {
            commands::schema::remove(&db)?;
        }
        Commands::Replicate {
            db,
            user,
            app_version,
            payload,
            batch_size,
            timeout_secs,
            untagged,
        } => {
            let options = commands::replicate::Options {
                batch_size,
                timeout_secs,
                profile: profile(untagged),
            };
            let report = commands::replicate::run(&db, &user, &app_version, &payload, &options)?;
            println!("{report}");
        }
        Commands::Inspect { payload, format } => {
            commands::inspect::run(&payload, format)?;
        }
        Commands::Pack { input, output } => {
            commands::pack::run(&input, &output)?;
        }
        Commands::Version => {
            println!("usagelog CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
