//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.equipstat.toml` files.

use crate::report::{ReportFormat, ReportOptions};
use crate::retention::DEFAULT_CAPACITY;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".equipstat.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Retention settings.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of files prepared concurrently during batch uploads.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// Per-owner retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Datasets kept per owner.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// Storage backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON snapshot file holding every retained dataset.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("equipstat_store.json")
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Format used when `report` is run without `--format`.
    #[serde(default)]
    pub format: ReportFormat,

    /// Append a data preview table.
    #[serde(default = "default_true")]
    pub include_rows: bool,

    /// Maximum rows in the data preview.
    #[serde(default = "default_max_preview_rows")]
    pub max_preview_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            include_rows: true,
            max_preview_rows: default_max_preview_rows(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_preview_rows() -> usize {
    50
}

impl ReportConfig {
    pub fn options(&self) -> ReportOptions {
        ReportOptions {
            include_rows: self.include_rows,
            max_preview_rows: self.max_preview_rows,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Reject settings the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retention.capacity == 0 {
            bail!("retention.capacity must be at least 1");
        }
        if self.general.concurrency == 0 {
            bail!("general.concurrency must be at least 1");
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(capacity) = args.capacity {
            self.retention.capacity = capacity;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref store) = args.store {
            self.storage.path = store.clone();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
