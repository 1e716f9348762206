//! HTTP server command

use super::{load_config, INFO};
use anyhow::{Context, Result};
use cfp_storage::{http::router, observability, storage};
use console::style;
use std::path::Path;
use tokio::net::TcpListener;

/// Run the upload server
#[derive(Debug)]
pub struct ServeCommand {
    /// Bind address override
    pub bind: Option<String>,
}

impl ServeCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration cannot be loaded
    /// - The storage backend cannot be initialized
    /// - The listener cannot bind
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        observability::init()?;
        let config = load_config(config_path)?;

        let provider = storage::init(&config.storage)
            .await
            .context("Failed to initialize storage backend")?;
        let bind = self.bind.unwrap_or(config.server.bind_address);

        let listener = TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind {bind}"))?;

        println!(
            "{} Serving {} storage on {}",
            INFO,
            style(provider.backend_name()).cyan(),
            style(format!("http://{}", listener.local_addr()?)).bold()
        );
        tracing::info!(%bind, backend = provider.backend_name(), "server listening");

        axum::serve(listener, router(provider, config.server.max_body_bytes))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        tracing::info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
