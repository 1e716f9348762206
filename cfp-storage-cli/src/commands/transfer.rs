//! Commands that talk to a running server

use super::{FAILURE, SUCCESS};
use anyhow::{Context, Result};
use cfp_storage::client::{AbortSignal, UploadClient, UploadError, UploadRequest};
use cfp_storage::storage::ResourceKind;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Upload or delete through the HTTP API
#[derive(Debug)]
pub enum TransferCommand {
    /// Upload a local file
    Upload {
        /// Local file
        file: PathBuf,
        /// Resource kind
        kind: ResourceKind,
        /// Owning entity id
        target: Option<String>,
    },
    /// Delete a stored object
    Delete {
        /// Storage path
        path: String,
    },
}

impl TransferCommand {
    /// Execute the command against the server at `server`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the server rejects
    /// or cannot be reached
    pub async fn execute(self, server: &str) -> Result<()> {
        let client = UploadClient::new(server);
        match self {
            Self::Upload { file, kind, target } => upload(&client, &file, kind, target).await,
            Self::Delete { path } => delete(&client, &path).await,
        }
    }
}

async fn upload(
    client: &UploadClient,
    file: &Path,
    kind: ResourceKind,
    target: Option<String>,
) -> Result<()> {
    let mut request = UploadRequest::from_path(kind, file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if let Some(target) = target {
        request = request.with_target_id(target);
    }

    let bar = ProgressBar::new(request.data.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%)")
            .context("Failed to set progress style")?
            .progress_chars("=> "),
    );

    let abort = AbortSignal::new();
    let on_ctrl_c = abort.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.abort();
        }
    });

    let progress_bar = bar.clone();
    let result = client
        .upload(
            request,
            move |p| {
                progress_bar.set_length(p.total);
                progress_bar.set_position(p.loaded);
            },
            Some(&abort),
        )
        .await;
    watcher.abort();

    match result {
        Ok(stored) => {
            bar.finish_and_clear();
            println!(
                "{} Uploaded {} ({} bytes, {})",
                SUCCESS,
                style(&stored.path).green().bold(),
                stored.size,
                stored.content_type
            );
            println!("  {}", style(&stored.url).cyan());
            Ok(())
        }
        Err(UploadError::Aborted) => {
            bar.abandon();
            anyhow::bail!("Upload aborted")
        }
        Err(e) => {
            bar.abandon();
            if let Some(code) = e.code() {
                eprintln!("{} {}", FAILURE, style(code).red().bold());
            }
            Err(e).context("Upload failed")
        }
    }
}

async fn delete(client: &UploadClient, path: &str) -> Result<()> {
    if client.delete(path).await.context("Delete failed")? {
        println!("{} Deleted {}", SUCCESS, style(path).green());
        Ok(())
    } else {
        anyhow::bail!("Server refused to delete {path}")
    }
}
