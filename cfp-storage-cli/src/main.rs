//! cfp-storage CLI tool

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

mod commands;

use anyhow::Result;
use cfp_storage::storage::ResourceKind;
use clap::{Parser, Subcommand};
use commands::{AdminCommand, ServeCommand, TransferCommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cfp-storage")]
#[command(version)]
#[command(about = "Serve and administer conference upload storage", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the layered lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the upload and file-serving HTTP server
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Upload a file to a running server
    Upload {
        /// File to upload
        file: PathBuf,
        /// Resource kind (avatar, submission, logo, banner, temp)
        #[arg(long = "type")]
        kind: ResourceKind,
        /// Owning entity id (required except for temp)
        #[arg(long)]
        target: Option<String>,
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },
    /// Delete a stored object through a running server
    Delete {
        /// Storage path
        path: String,
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },
    /// List stored objects under a prefix
    List {
        /// Directory-like prefix (empty lists everything)
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Show an object's metadata
    Stat {
        /// Storage path
        path: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Move an object to a new path
    Mv {
        /// Current path
        source: String,
        /// New path
        dest: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Serve { bind } => ServeCommand { bind }.execute(config).await,
        Commands::Upload {
            file,
            kind,
            target,
            server,
        } => {
            TransferCommand::Upload {
                file,
                kind,
                target,
            }
            .execute(&server)
            .await
        }
        Commands::Delete { path, server } => TransferCommand::Delete { path }.execute(&server).await,
        Commands::List { prefix } => AdminCommand::List { prefix }.execute(config).await,
        Commands::Stat { path, json } => AdminCommand::Stat { path, json }.execute(config).await,
        Commands::Mv { source, dest } => AdminCommand::Move { source, dest }.execute(config).await,
    }
}
