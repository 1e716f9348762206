//! Configuration management for cfp-storage
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `CFP_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/cfp-storage/{service}/config.toml` (user config, XDG)
//! 4. `/etc/cfp-storage/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Environment variable format: `CFP_SECTION__FIELD_NAME`
//! - Use `__` (double underscore) to separate nested sections
//! - Use `_` (single underscore) within field names
//! - Example: `CFP_STORAGE__BACKEND__PROVIDER=s3`
//!
//! # Example Configuration
//!
//! ```toml
//! # config.toml
//! [server]
//! bind_address = "0.0.0.0:8080"
//! max_body_bytes = 115343360
//!
//! [storage.urls]
//! public_base_url = "https://cdn.example.com/uploads"
//! internal_base_url = "/api/files"
//!
//! [storage.backend]
//! provider = "local"
//! root = "/var/lib/cfp/uploads"
//! ```
//!
//! # Usage
//!
//! ```rust
//! use cfp_storage::config::CfpStorageConfig;
//!
//! let config = CfpStorageConfig::default();
//! assert_eq!(config.server.bind_address, "127.0.0.1:3000");
//! ```

use crate::storage::StorageConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default service name used for config file lookup
pub const DEFAULT_SERVICE_NAME: &str = "cfp-storage";

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfpStorageConfig {
    /// HTTP server settings
    pub server: ServerSettings,

    /// Storage backend and URL settings
    pub storage: StorageConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on
    pub bind_address: String,

    /// Maximum request body size in bytes
    ///
    /// Must leave room above the largest upload policy (100 MiB) for
    /// multipart framing.
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            max_body_bytes: 110 * 1024 * 1024,
        }
    }
}

impl CfpStorageConfig {
    /// Load configuration for a specific service
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file contains invalid TOML syntax
    /// - Configuration values fail type conversion
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config: /etc/cfp-storage/{service_name}/config.toml
        let system_config = PathBuf::from("/etc/cfp-storage")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config: ./config.toml
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables
        figment = figment.merge(Env::prefixed("CFP_").split("__").lowercase(true));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Defaults fill anything the file leaves out, and `CFP_` environment
    /// variables still override it. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file contains invalid TOML or values fail
    /// type conversion
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CFP_").split("__").lowercase(true))
            .extract()?;
        Ok(config)
    }

    /// Get the recommended user config path for a service
    ///
    /// ```rust
    /// use cfp_storage::config::CfpStorageConfig;
    ///
    /// let path = CfpStorageConfig::recommended_path("cfp-storage");
    /// assert!(path.ends_with("config.toml"));
    /// ```
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("cfp-storage")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BackendSettings, LocalSettings, PUBLIC_ROUTE};

    #[test]
    fn test_default_config() {
        let config = CfpStorageConfig::default();
        assert_eq!(config.server.bind_address, "127.0.0.1:3000");
        assert!(config.server.max_body_bytes > 100 * 1024 * 1024);
        assert_eq!(config.storage.urls.public_base_url, PUBLIC_ROUTE);
        assert_eq!(
            config.storage.backend,
            BackendSettings::Local(LocalSettings::default())
        );
    }

    #[test]
    fn test_defaults_survive_toml_round_trip() {
        let rendered = toml::to_string(&CfpStorageConfig::default()).unwrap();
        let parsed: CfpStorageConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, CfpStorageConfig::default());
    }

    #[test]
    fn test_recommended_path() {
        let path = CfpStorageConfig::recommended_path("test-app");
        let path = path.to_str().unwrap();

        assert!(path.contains("test-app"));
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let config = CfpStorageConfig::load_from("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.server, ServerSettings::default());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind_address = "0.0.0.0:9000"

[storage.urls]
public_base_url = "https://cdn.example.com/u"

[storage.backend]
provider = "local"
root = "/srv/cfp"
"#,
        )
        .unwrap();

        let config = CfpStorageConfig::load_from(&path).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        // Untouched fields keep their defaults
        assert_eq!(
            config.server.max_body_bytes,
            ServerSettings::default().max_body_bytes
        );
        assert_eq!(config.storage.urls.public_base_url, "https://cdn.example.com/u");
        assert_eq!(config.storage.urls.internal_base_url, "/api/files");
        assert_eq!(
            config.storage.backend,
            BackendSettings::Local(LocalSettings {
                root: PathBuf::from("/srv/cfp")
            })
        );
    }

    #[test]
    fn test_load_from_switches_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage.backend]\nprovider = \"s3\"\nbucket = \"talks\"\nregion = \"eu-west-1\"\n",
        )
        .unwrap();

        let config = CfpStorageConfig::load_from(&path).unwrap();
        let BackendSettings::S3(s3) = config.storage.backend else {
            panic!("expected s3 backend");
        };
        assert_eq!(s3.bucket, "talks");
        assert_eq!(s3.region, "eu-west-1");
    }
}
