use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse TOML config: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("failed to parse JSON config: {0}")]
  Json(#[from] serde_json::Error),

  #[error("unsupported config format '{extension}' (expected .toml or .json)")]
  UnsupportedFormat { extension: String },

  #[error("invalid value for '{field}': {message}")]
  Invalid { field: &'static str, message: String },
}

impl ConfigError {
  pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
    Self::Invalid {
      field,
      message: message.into(),
    }
  }
}
