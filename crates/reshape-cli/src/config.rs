//! CLI configuration
//!
//! Loaded from a TOML file passed with `--config`. Every field is optional;
//! command-line flags override the file and `RUST_LOG` overrides `log_filter`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors while loading the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`CliConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Output format used when it cannot be derived from a file extension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl OutputFormat {
    /// Codec format name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Remove marker keys from migrated output
    pub strip_markers: bool,
    /// Format for stdin/stdout
    pub default_format: OutputFormat,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            strip_markers: true,
            default_format: OutputFormat::Json,
            log_filter: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed or unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With marker stripping
    #[inline]
    #[must_use]
    pub fn with_strip_markers(mut self, strip: bool) -> Self {
        self.strip_markers = strip;
        self
    }

    /// With default format
    #[inline]
    #[must_use]
    pub fn with_default_format(mut self, format: OutputFormat) -> Self {
        self.default_format = format;
        self
    }

    /// Log filter, preferring `RUST_LOG` when set
    #[must_use]
    pub fn effective_log_filter(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or_else(|| self.log_filter.clone())
    }
}
