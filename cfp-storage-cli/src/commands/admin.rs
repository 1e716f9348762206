//! Administrative commands run directly against the configured backend

use super::{load_config, INFO, SUCCESS};
use anyhow::{Context, Result};
use cfp_storage::storage::{create_provider, FileMetadata, StorageProvider};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

/// Storage administration
#[derive(Debug)]
pub enum AdminCommand {
    /// List objects under a prefix
    List {
        /// Directory-like prefix
        prefix: String,
    },
    /// Show metadata for one object
    Stat {
        /// Storage path
        path: String,
        /// Emit JSON
        json: bool,
    },
    /// Move an object
    Move {
        /// Current path
        source: String,
        /// New path
        dest: String,
    },
}

impl AdminCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, the backend cannot
    /// be created, or the storage operation fails
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let storage = create_provider(&config.storage)
            .await
            .context("Failed to initialize storage backend")?;

        match self {
            Self::List { prefix } => list(&storage, &prefix).await,
            Self::Stat { path, json } => stat(&storage, &path, json).await,
            Self::Move { source, dest } => move_object(&storage, &source, &dest).await,
        }
    }
}

async fn list(storage: &Arc<dyn StorageProvider>, prefix: &str) -> Result<()> {
    let paths = storage.list(prefix).await?;

    if paths.is_empty() {
        println!("  {}", style("(No objects)").dim());
        return Ok(());
    }

    for path in &paths {
        println!("{path}");
    }
    println!();
    println!("{} {} object(s) in {} storage", INFO, paths.len(), storage.backend_name());
    Ok(())
}

async fn stat(storage: &Arc<dyn StorageProvider>, path: &str, json: bool) -> Result<()> {
    let meta = storage.get_metadata(path).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }

    print_metadata(storage.as_ref(), &meta);
    Ok(())
}

fn print_metadata(storage: &dyn StorageProvider, meta: &FileMetadata) {
    let visibility = if meta.is_public {
        style("public").green()
    } else {
        style("private").yellow()
    };

    println!("{}", style(&meta.path).bold());
    println!("{}", "─".repeat(60));
    println!("{:<16} {}", "Size", meta.size);
    println!("{:<16} {}", "Content-Type", meta.content_type);
    println!("{:<16} {}", "Last modified", meta.last_modified.to_rfc3339());
    println!("{:<16} {}", "Visibility", visibility);
    println!("{:<16} {}", "URL", storage.url_for(&meta.path, meta.is_public));

    let mut keys: Vec<_> = meta.metadata.keys().collect();
    keys.sort();
    for key in keys {
        println!("{:<16} {}", format!("meta.{key}"), meta.metadata[key]);
    }
}

async fn move_object(storage: &Arc<dyn StorageProvider>, source: &str, dest: &str) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Failed to set progress style")?,
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner.set_message(format!("Moving {source} to {dest}..."));

    let result = storage.move_object(source, dest).await;
    spinner.finish_and_clear();
    result?;

    println!(
        "{} Moved {} to {}",
        SUCCESS,
        style(source).dim(),
        style(dest).green().bold()
    );
    Ok(())
}
