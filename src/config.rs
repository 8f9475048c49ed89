use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

use crate::errors::ConfigError;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub ocr: OcrSection,
}

fn default_currency() -> String {
    "$".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            log_filter: default_log_filter(),
            ocr: OcrSection::default(),
        }
    }
}

/// Which service turns receipt images into text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    /// Only text and text-bearing PDF receipts can be read.
    #[default]
    Disabled,
    Remote,
}

#[derive(Debug, Default, Deserialize)]
pub struct OcrSection {
    #[serde(default)]
    pub backend: OcrBackend,
    #[serde(default)]
    pub remote: RemoteOcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteOcrConfig {
    #[serde(default = "default_ocr_url")]
    pub base_url: String,
    /// Name of the env var holding a bearer token, if the service wants one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ocr_url() -> String {
    "http://localhost:8884".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RemoteOcrConfig {
    fn default() -> Self {
        Self {
            base_url: default_ocr_url(),
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}
