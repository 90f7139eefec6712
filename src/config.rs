//! Configuration management for the content-schema engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (content-schema.toml)
//! - Environment variables (CONTENT_SCHEMA__*)
//!
//! ## Example config file (content-schema.toml):
//! ```toml
//! [loader]
//! base_address = "schema://local/root.json"
//! schema_dir = "./schemas"
//!
//! [validation]
//! reference_time = "2024-06-01T00:00:00Z"
//! max_errors = 200
//!
//! [output]
//! format = "pretty"
//!
//! [logging]
//! filter = "content_schema=debug"
//! ```

use chrono::{DateTime, Utc};
use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::schema::DEFAULT_BASE_ADDRESS;

/// Main configuration for the engine and its CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Schema loading settings
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Schema loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Base address for schemas loaded from text without a file
    #[serde(default = "default_base_address")]
    pub base_address: String,

    /// Directory of schemas pre-registered for cross-document `$ref`s
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,
}

/// Validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Fixed "now" for relative date windows; the wall clock when unset
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,

    /// Report at most this many diagnostics per run
    #[serde(default)]
    pub max_errors: Option<usize>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON output format
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_base_address() -> String {
    DEFAULT_BASE_ADDRESS.to_string()
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_address: default_base_address(),
            schema_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "content-schema.toml",
            ".content-schema.toml",
            "config/content-schema.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "content-schema") {
            let xdg_config = config_dir.config_dir().join("content-schema.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (CONTENT_SCHEMA__*)
        builder = builder.add_source(
            Environment::with_prefix("CONTENT_SCHEMA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// The configured reference time, or now
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.validation.reference_time.unwrap_or_else(Utc::now)
    }

    /// Get the schema directory (resolves relative paths)
    pub fn schema_dir(&self) -> Option<PathBuf> {
        self.loader.schema_dir.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                std::env::current_dir().unwrap_or_default().join(p)
            }
        })
    }
}
