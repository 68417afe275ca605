use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::barcode::{DecoderConfig, RecognizerConfig};
use crate::nutrition::NormalizerConfig;

/// Application-level constants
pub const APP_NAME: &str = "NutriScan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path to a JSON file with a (partial) `ScanConfig`.
pub const ENV_CONFIG_PATH: &str = "NUTRISCAN_CONFIG";
pub const ENV_RECOGNIZER_URL: &str = "NUTRISCAN_RECOGNIZER_URL";
pub const ENV_RECOGNIZER_KEY: &str = "NUTRISCAN_RECOGNIZER_KEY";
pub const ENV_DECODE_BUDGET_MS: &str = "NUTRISCAN_DECODE_BUDGET_MS";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "nutriscan=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// All tunables, grouped by component.
///
/// Every section is optional in JSON; missing fields keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub decoder: DecoderConfig,
    pub normalizer: NormalizerConfig,
    pub recognizer: RecognizerConfig,
}

impl ScanConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Load from the process environment.
    ///
    /// `NUTRISCAN_CONFIG` names a base JSON file; the individual variables
    /// override fields on top of it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(ENV_CONFIG_PATH) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(url) = lookup(ENV_RECOGNIZER_URL) {
            config.recognizer.endpoint = url;
        }
        if let Some(key) = lookup(ENV_RECOGNIZER_KEY) {
            config.recognizer.api_key = Some(key);
        }
        if let Some(raw) = lookup(ENV_DECODE_BUDGET_MS) {
            config.decoder.budget_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_DECODE_BUDGET_MS} must be milliseconds, got '{raw}'"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decoder.validate()?;
        self.normalizer.validate()?;
        Ok(())
    }
}
