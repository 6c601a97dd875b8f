//! Nimbus configuration.
//!
//! One YAML file with four sections (`server`, `storage`, `transfers`,
//! `logging`). Every field has a default, so a partial file is valid input;
//! `Config::validate` reports all problems at once with dotted field paths.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, RemotePath};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Nimbus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transfers: TransfersConfig,
    pub logging: LoggingConfig,
}

/// WebDAV server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server origin, e.g. `https://cloud.example.com`.
    pub base_url: String,
    /// Account user name.
    pub user: String,
    /// Path prefix of the per-user file tree on the server.
    pub dav_root: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for materialized content (`<root>/<identifier>/<name>`).
    pub root: PathBuf,
    /// Path of the SQLite catalogue.
    pub database: PathBuf,
}

/// Background transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransfersConfig {
    /// Simultaneous connections to the server.
    pub max_connections_per_host: u32,
    /// Transfers allowed to run at once; the rest wait for a slot.
    pub max_concurrent_transfers: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Reads and parses the YAML file at `path`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    /// Like [`Config::load`], but a missing or broken file yields the defaults
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %format!("{e:#}"), "Using default configuration");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/nimbus/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("nimbus")
            .join("config.yaml")
    }

    /// Remote path of the account's root container (`<dav_root>/<user>`).
    pub fn home_path(&self) -> Result<RemotePath, DomainError> {
        let root = self.server.dav_root.trim_end_matches('/');
        let root = if root.is_empty() {
            RemotePath::root()
        } else {
            RemotePath::new(root.to_string())?
        };
        root.join(&self.server.user)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost".to_string(),
            user: String::new(),
            dav_root: "/remote.php/dav/files".to_string(),
            timeout_secs: 60,
            user_agent: format!("nimbus/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("nimbus");
        Self {
            root: data_dir.join("storage"),
            database: data_dir.join("catalogue.db"),
        }
    }
}

impl Default for TransfersConfig {
    fn default() -> Self {
        Self {
            max_connections_per_host: 1,
            max_concurrent_transfers: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"server.base_url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- server ---
        match url::Url::parse(&self.server.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError {
                field: "server.base_url".into(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError {
                field: "server.base_url".into(),
                message: format!("invalid URL: {e}"),
            }),
        }

        if self.server.user.trim().is_empty() {
            errors.push(ValidationError {
                field: "server.user".into(),
                message: "must not be empty".into(),
            });
        } else if self.home_path().is_err() {
            errors.push(ValidationError {
                field: "server.user".into(),
                message: format!("not usable as a path component: '{}'", self.server.user),
            });
        }

        if !self.server.dav_root.starts_with('/') {
            errors.push(ValidationError {
                field: "server.dav_root".into(),
                message: "must start with '/'".into(),
            });
        }

        if self.server.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "server.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- storage ---
        if self.storage.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.root".into(),
                message: "must not be empty".into(),
            });
        }

        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".into(),
                message: "must not be empty".into(),
            });
        }

        // --- transfers ---
        if self.transfers.max_connections_per_host == 0
            || self.transfers.max_connections_per_host > 16
        {
            errors.push(ValidationError {
                field: "transfers.max_connections_per_host".into(),
                message: "must be in range 1..=16".into(),
            });
        }

        if self.transfers.max_concurrent_transfers == 0 {
            errors.push(ValidationError {
                field: "transfers.max_concurrent_transfers".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use nimbus_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .server_base_url("https://cloud.example.com")
///     .server_user("alice")
///     .storage_root(PathBuf::from("/var/lib/nimbus"))
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn server_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.server.base_url = base_url.into();
        self
    }

    pub fn server_user(mut self, user: impl Into<String>) -> Self {
        self.config.server.user = user.into();
        self
    }

    pub fn server_dav_root(mut self, dav_root: impl Into<String>) -> Self {
        self.config.server.dav_root = dav_root.into();
        self
    }

    pub fn server_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.server.timeout_secs = seconds;
        self
    }

    pub fn server_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.server.user_agent = user_agent.into();
        self
    }

    // --- storage ---

    pub fn storage_root(mut self, root: PathBuf) -> Self {
        self.config.storage.root = root;
        self
    }

    pub fn storage_database(mut self, database: PathBuf) -> Self {
        self.config.storage.database = database;
        self
    }

    // --- transfers ---

    pub fn transfers_max_connections_per_host(mut self, n: u32) -> Self {
        self.config.transfers.max_connections_per_host = n;
        self
    }

    pub fn transfers_max_concurrent_transfers(mut self, n: u32) -> Self {
        self.config.transfers.max_concurrent_transfers = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
