//! Configuration types and loading

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Content store configuration
    pub storage: StorageConfig,

    /// Preview generation limits
    pub preview: PreviewConfig,

    /// Log output configuration
    pub logging: LoggingConfig,

    /// Node id mixed into generated ids
    pub node_id: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory backend is used when unset
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Run embedded migrations on connect
    pub migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            migrate: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the local content store
    pub local_path: String,
    /// Path prefix for stored blobs
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: "./var/store".to_string(),
            namespace: "attachments".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG preview quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 400,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,chat_attachments=debug".to_string(),
            json: false,
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    MissingValue(String),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Config source error: {0}")]
    Source(#[from] ::config::ConfigError),
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }
        if let Ok(size) = std::env::var("DATABASE_POOL_SIZE") {
            config.database.max_connections =
                size.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "DATABASE_POOL_SIZE".to_string(),
                    message: format!("'{}' is not a number", size),
                })?;
        }

        if let Ok(path) = std::env::var("CHAT_STORAGE_PATH") {
            config.storage.local_path = path;
        }
        if let Ok(namespace) = std::env::var("CHAT_STORAGE_NAMESPACE") {
            config.storage.namespace = namespace;
        }

        if let Ok(node) = std::env::var("CHAT_NODE_ID") {
            config.node_id = node.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CHAT_NODE_ID".to_string(),
                message: format!("'{}' is not a valid node id", node),
            })?;
        }

        if let Ok(v) = std::env::var("CHAT_LOG_JSON") {
            config.logging.json = v == "true" || v == "1";
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional TOML file, overridden by
    /// `CHAT__SECTION__KEY` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(false),
            );
        }

        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix("CHAT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.local_path.trim().is_empty() {
            return Err(ConfigError::MissingValue("storage.local_path".to_string()));
        }
        if self.preview.max_width == 0 || self.preview.max_height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "preview".to_string(),
                message: "preview bounds must be positive".to_string(),
            });
        }
        if !(1..=100).contains(&self.preview.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                key: "preview.jpeg_quality".to_string(),
                message: format!("{} is outside 1..=100", self.preview.jpeg_quality),
            });
        }
        Ok(())
    }
}
