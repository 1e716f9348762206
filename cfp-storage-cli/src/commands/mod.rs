//! CLI command implementations

pub mod admin;
pub mod serve;
pub mod transfer;

pub use admin::AdminCommand;
pub use serve::ServeCommand;
pub use transfer::TransferCommand;

use anyhow::{Context, Result};
use cfp_storage::config::{CfpStorageConfig, DEFAULT_SERVICE_NAME};
use console::Emoji;
use std::path::Path;

pub static SUCCESS: Emoji = Emoji("✓", "√");
pub static FAILURE: Emoji = Emoji("✗", "x");
pub static INFO: Emoji = Emoji("ℹ", "i");

/// Loads an explicit config file, or the layered defaults
pub fn load_config(path: Option<&Path>) -> Result<CfpStorageConfig> {
    match path {
        Some(path) => CfpStorageConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => CfpStorageConfig::load_for_service(DEFAULT_SERVICE_NAME)
            .context("Failed to load configuration"),
    }
}
