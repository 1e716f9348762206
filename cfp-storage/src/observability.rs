//! Structured logging
//!
//! Storage operations log at `debug`, inconsistency windows (a `move` whose
//! delete step failed) at `warn`, and internal failures seen at the HTTP
//! boundary at `error`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Pretty in debug builds, JSON in release builds
    #[default]
    Auto,
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    const fn resolve(self) -> Self {
        match self {
            Self::Auto if cfg!(debug_assertions) => Self::Pretty,
            Self::Auto => Self::Json,
            other => other,
        }
    }
}

/// Default filter when `RUST_LOG` is unset
#[must_use]
pub fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) {
        EnvFilter::new("debug,cfp_storage=trace")
    } else {
        EnvFilter::new("info")
    }
}

/// Initialize logging
///
/// Sets up:
/// - Structured logging with JSON formatting (production) or pretty formatting (dev)
/// - Environment-based log level filtering (`RUST_LOG`)
///
/// # Example
///
/// ```rust,no_run
/// use cfp_storage::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init() -> anyhow::Result<()> {
    init_with(LogFormat::Auto)
}

/// Initialize logging with an explicit output format
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init_with(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());
    let registry = tracing_subscriber::registry().with(env_filter);

    match format.resolve() {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        _ => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_follows_build_profile() {
        #[cfg(debug_assertions)]
        assert_eq!(LogFormat::Auto.resolve(), LogFormat::Pretty);

        #[cfg(not(debug_assertions))]
        assert_eq!(LogFormat::Auto.resolve(), LogFormat::Json);

        assert_eq!(LogFormat::Json.resolve(), LogFormat::Json);
    }

    #[test]
    fn test_second_init_fails() {
        // Whichever call installs first wins; a later one must error, not panic
        let _ = init_with(LogFormat::Json);
        assert!(init_with(LogFormat::Pretty).is_err());
    }
}
