//! Configuration file management.
//!
//! Handles loading and saving the TOML configuration that locates the
//! relational store and the storage backend roots.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{ExportError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# labcode-export Configuration
# Auto-generated - edit as needed

[database]
# Path to the service database (optional, defaults to <data_dir>/labcode.db)
# path = "/data/labcode.db"

[storage]
# Root directory for local-mode run content
# data_root = "/data/runs"

# Mirror root for s3-mode run content (bucket mount or sync target)
# mirror_root = "/data/s3-mirror"

[s3]
# Used only to construct download URLs for s3-mode runs
endpoint = "https://s3.amazonaws.com"
bucket = "labcode-runs"

[paths]
# Custom data directory (optional, defaults to ~/.labcode-export)
# data_dir = "/custom/path"
"#;

/// Database location configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Path to the service SQLite database.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Storage backend root directories.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Root directory for local-mode run content.
    #[serde(default)]
    pub data_root: Option<PathBuf>,

    /// Mirror root for s3-mode run content.
    #[serde(default)]
    pub mirror_root: Option<PathBuf>,
}

/// Object-storage URL construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Endpoint used for download-URL construction.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bucket name.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            bucket: default_bucket(),
        }
    }
}

fn default_endpoint() -> String {
    "https://s3.amazonaws.com".to_string()
}

fn default_bucket() -> String {
    "labcode-runs".to_string()
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExportConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub paths: PathConfig,
}

impl ExportConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".labcode-export")
    }

    /// Get the service database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("labcode.db"))
    }

    /// Get the local-mode data root.
    #[must_use]
    pub fn data_root(&self) -> PathBuf {
        self.storage
            .data_root
            .clone()
            .unwrap_or_else(|| self.data_dir().join("runs"))
    }

    /// Get the s3-mirror root.
    #[must_use]
    pub fn mirror_root(&self) -> Option<PathBuf> {
        self.storage.mirror_root.clone()
    }

}

/// Load configuration from file or create default.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<ExportConfig> {
    let config_path = ExportConfig::default_data_dir().join("config.toml");

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(ExportConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<ExportConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| ExportError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| ExportError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Create default configuration file if it doesn't exist.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists() -> Result<()> {
    let config_path = ExportConfig::default_data_dir().join("config.toml");

    if !config_path.exists() {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ExportError::io("Failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| ExportError::io("Failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "Created default configuration");
    }

    Ok(())
}
