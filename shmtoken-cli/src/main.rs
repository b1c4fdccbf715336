// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmtoken CLI
//!
//! Command-line interface for creating shared memory regions and reaching
//! them from other processes through open tokens.

use clap::{Parser, Subcommand};

mod commands;
mod error;

pub use error::CliError;

/// shmtok - Named shared memory regions with portable open tokens
#[derive(Parser)]
#[command(name = "shmtok")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults are used when omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a region, print its token and hold it open until Ctrl-C
    Create {
        /// Base name of the region
        name: String,

        /// Size in bytes (rounded up to the page size)
        #[arg(short, long)]
        size: Option<usize>,

        /// Append a process-unique suffix to the name
        #[arg(long, conflicts_with = "exact")]
        unique: bool,

        /// Use the name exactly as given
        #[arg(long)]
        exact: bool,
    },

    /// Decode a token and show the region it describes
    Inspect {
        /// Base64 open token
        token: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write bytes into a region opened from a token
    Write {
        /// Base64 open token
        token: String,

        /// Byte offset into the region
        #[arg(short, long, default_value_t = 0)]
        offset: usize,

        /// UTF-8 data to write
        #[arg(short, long)]
        data: String,
    },

    /// Read bytes from a region opened read-only from a token
    Read {
        /// Base64 open token
        token: String,

        /// Byte offset into the region
        #[arg(short, long, default_value_t = 0)]
        offset: usize,

        /// Number of bytes to read (0 reads to the end of the region)
        #[arg(short, long, default_value_t = 64)]
        len: usize,

        /// Print the bytes as text instead of hex
        #[arg(long)]
        text: bool,
    },

    /// Force-unlink a region left behind by a crashed process
    Unlink {
        /// Exact name of the region, including any unique suffix
        name: String,

        /// Size used to open the region before unlinking it
        #[arg(short, long, default_value_t = 1)]
        size: usize,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    // Dispatch to command handlers
    match cli.command {
        Commands::Create {
            name,
            size,
            unique,
            exact,
        } => {
            let unique = unique || (!exact && config.defaults.make_unique);
            commands::create::execute(&config, &name, size, unique).await
        }
        Commands::Inspect { token, json } => commands::inspect::execute(&token, json).await,
        Commands::Write {
            token,
            offset,
            data,
        } => commands::write::execute(&config, &token, offset, &data).await,
        Commands::Read {
            token,
            offset,
            len,
            text,
        } => commands::read::execute(&config, &token, offset, len, text).await,
        Commands::Unlink { name, size } => commands::unlink::execute(&config, &name, size).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
