//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: APIFLOW_, nesting separator: `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/apiflow/{service_name}/config.toml
//! 4. System directory: /etc/apiflow/{service_name}/config.toml
//! 5. Default values
//!
//! A `.env` file in the working directory is read into the process
//! environment first, so its `APIFLOW_` entries behave like real variables.
//!
//! ```toml
//! [service]
//! name = "users"
//! port = 8088
//! environment = "production"
//!
//! [response]
//! format = "xml"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::envelope::ResponseFormat;
use crate::error::Result;

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "APIFLOW_";

/// Directory name used under XDG and /etc
const CONFIG_DIR: &str = "apiflow";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Response configuration
    #[serde(default)]
    pub response: ResponseConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_name")]
    pub name: String,

    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Drain in-flight requests on SIGINT/SIGTERM
    #[serde(default = "default_true")]
    pub graceful_shutdown: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            timeout_secs: default_timeout(),
            environment: default_environment(),
            graceful_shutdown: default_true(),
        }
    }
}

/// Response envelope configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Output format: `json` or `xml`
    #[serde(default)]
    pub format: ResponseFormat,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            format: ResponseFormat::default(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_name() -> String {
    "apiflow".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_true() -> bool {
    true
}

fn default_body_limit() -> usize {
    64 * 1024 * 1024
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name used for file lookup is the binary name.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        load_dotenv();

        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Skips the XDG and system directories. Environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        load_dotenv();

        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Config file paths for a service, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_DIR);
        if let Some(path) = xdg_dirs.find_config_file(Path::new(service_name).join("config.toml")) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_DIR)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Whether the service runs in the development environment
    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.service.environment == "dev" || self.service.environment == "development"
    }

    /// Whether the service runs in production
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.service.environment == "production" || self.service.environment == "prod"
    }

    /// `host:port` to bind the listener to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }

    /// Request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }
}

fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.name, "apiflow");
        assert_eq!(config.service.port, 8088);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.response.format, ResponseFormat::Json);
        assert_eq!(config.response.body_limit_bytes, 64 * 1024 * 1024);
        assert!(config.service.graceful_shutdown);
        assert!(config.is_dev());
    }

    #[test]
    fn test_bind_address() {
        let mut config = Config::default();
        config.service.host = "127.0.0.1".to_string();
        config.service.port = 9000;
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = from_toml(
            r#"
            [service]
            name = "users"
            environment = "production"

            [response]
            format = "xml"
            "#,
        );

        assert_eq!(config.service.name, "users");
        assert_eq!(config.service.port, 8088);
        assert!(config.is_production());
        assert!(!config.is_dev());
        assert_eq!(config.response.format, ResponseFormat::Xml);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result: std::result::Result<Config, _> = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string("[response]\nformat = \"yaml\""))
            .extract();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_paths_order() {
        let paths = Config::find_config_paths("users");
        assert_eq!(paths.first(), Some(&PathBuf::from("config.toml")));
        assert_eq!(
            paths.last(),
            Some(&PathBuf::from("/etc/apiflow/users/config.toml"))
        );
    }
}
