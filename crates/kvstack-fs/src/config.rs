use std::path::PathBuf;

use kvstack_core::{PathTemplate, StoreError, TemplateError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How file contents are exposed as values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileModeKind {
    /// Values are `String`s, decoded with the configured encoding.
    #[default]
    Text,
    /// Values are raw bytes.
    Binary,
}

/// Text encodings the local-file backend can read and write.
pub const SUPPORTED_ENCODINGS: &[&str] = &["utf-8", "utf8"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid path template: {0}")]
    Template(#[from] TemplateError),

    #[error("config is for {configured:?} files, opened as {requested:?}")]
    ModeMismatch {
        configured: FileModeKind,
        requested: FileModeKind,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Settings of a [`LocalFiles`](crate::LocalFiles) store.
///
/// ```toml
/// rootdir = "/var/data"
/// template = "{user}/{name}.json"
/// mode = "text"
/// max_levels = 2
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalFilesConfig {
    /// Directory all keys live under.
    pub rootdir: PathBuf,
    /// Template for paths relative to `rootdir`. `None` accepts every file.
    pub template: Option<String>,
    pub mode: FileModeKind,
    /// Subdirectory levels iteration descends; `None` for no bound.
    pub max_levels: Option<usize>,
    /// Write buffer capacity in bytes.
    pub buffering: usize,
    /// Text encoding; only UTF-8 is supported.
    pub encoding: String,
}

impl Default for LocalFilesConfig {
    fn default() -> Self {
        Self {
            rootdir: PathBuf::from("."),
            template: None,
            mode: FileModeKind::default(),
            max_levels: None,
            buffering: 8 * 1024,
            encoding: "utf-8".to_string(),
        }
    }
}

impl LocalFilesConfig {
    pub fn new(rootdir: impl Into<PathBuf>) -> Self {
        Self {
            rootdir: rootdir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings that do not need the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_ENCODINGS.contains(&self.encoding.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::UnsupportedEncoding(self.encoding.clone()));
        }
        if let Some(template) = &self.template {
            PathTemplate::new(template)?;
        }
        Ok(())
    }
}
