//! Deployment configuration.
//!
//! Load order: defaults → optional JSON file → `BURN_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use burn_crypto::PinHasher;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "darklock";
pub const APP_NAME: &str = "burn";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("cannot determine data directory")]
    NoDataDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    /// Ciphertext kept in the record itself.
    Inline,
    /// Ciphertext kept as objects under `<data_dir>/<blob_dir>`.
    Filesystem,
}

impl BlobBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "inline" => Some(BlobBackend::Inline),
            "filesystem" | "fs" => Some(BlobBackend::Filesystem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnConfig {
    /// Falls back to the platform data directory when unset.
    pub data_dir: Option<PathBuf>,
    pub database_file: String,
    pub blob_backend: BlobBackend,
    pub blob_dir: String,
    /// Hex-encoded server-side pepper for PIN digests.
    pub pin_pepper_hex: Option<String>,
    pub operation_timeout_ms: u64,
    pub blob_retries: u32,
    pub blob_backoff_ms: u64,
}

impl Default for BurnConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: "burn.db".into(),
            blob_backend: BlobBackend::Filesystem,
            blob_dir: "blobs".into(),
            pin_pepper_hex: None,
            operation_timeout_ms: 10_000,
            blob_retries: 1,
            blob_backoff_ms: 100,
        }
    }
}

impl BurnConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_slice(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    /// Apply `BURN_*` overrides from `vars`.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "BURN_DATA_DIR" => self.data_dir = Some(PathBuf::from(value)),
                "BURN_BLOB_BACKEND" => {
                    self.blob_backend = BlobBackend::parse(&value).ok_or(
                        ConfigError::InvalidValue {
                            key: "BURN_BLOB_BACKEND",
                            value,
                        },
                    )?;
                }
                "BURN_PIN_PEPPER" => self.pin_pepper_hex = Some(value),
                "BURN_OPERATION_TIMEOUT_MS" => {
                    self.operation_timeout_ms =
                        value.parse().map_err(|_| ConfigError::InvalidValue {
                            key: "BURN_OPERATION_TIMEOUT_MS",
                            value,
                        })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let dirs =
            ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn pin_hasher(&self) -> Result<PinHasher, ConfigError> {
        match &self.pin_pepper_hex {
            Some(pepper_hex) => {
                let pepper = hex::decode(pepper_hex).map_err(|_| ConfigError::InvalidValue {
                    key: "pin_pepper_hex",
                    value: "<redacted>".into(),
                })?;
                Ok(PinHasher::with_pepper(&pepper))
            }
            None => Ok(PinHasher::new()),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            blob_retries: self.blob_retries,
            blob_backoff: Duration::from_millis(self.blob_backoff_ms),
        }
    }
}

/// Runtime knobs the engine consumes.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Deadline for one whole create or retrieve.
    pub operation_timeout: Duration,
    /// Extra attempts after a transient blob failure.
    pub blob_retries: u32,
    /// First retry delay; doubles per attempt.
    pub blob_backoff: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        BurnConfig::default().engine_settings()
    }
}
