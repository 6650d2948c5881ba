//! Store configuration.
//!
//! ```toml
//! max_document_bytes = 16777216
//! default_number_to_keep = 1000
//! tail_buffer = 64
//! claim_poll_interval_ms = 100
//! stage_timeout_secs = 30
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-record limit of the default backend (same as a BSON document).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Largest encoded document body accepted by insert, update and mark.
    /// The store's own stamps are left out of the measurement.
    pub max_document_bytes: usize,

    /// Retention written by the store builder when no status record exists.
    pub default_number_to_keep: Option<u64>,

    /// Channel capacity between a history tail feeder and its iterator.
    pub tail_buffer: usize,

    /// How long a stage worker waits after a claim found nothing.
    pub claim_poll_interval_ms: u64,

    /// Upper bound on one `Stage::process` call.
    pub stage_timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            default_number_to_keep: None,
            tail_buffer: 64,
            claim_poll_interval_ms: 100,
            stage_timeout_secs: None,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_document_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_document_bytes must be positive".into(),
            ));
        }
        if self.tail_buffer == 0 {
            return Err(ConfigError::Invalid("tail_buffer must be positive".into()));
        }
        if self.stage_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "stage_timeout_secs must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn claim_poll_interval(&self) -> Duration {
        Duration::from_millis(self.claim_poll_interval_ms)
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}
