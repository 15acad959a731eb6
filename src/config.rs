//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// File name of the local key-value store inside the data directory.
pub const PROFILE_STORE_FILE: &str = "profile-store.json";

/// Timing for the staged ingestion driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Delay from acceptance to the first stage.
    pub first_stage_delay: Duration,
    /// Gap between consecutive stages. Must be non-zero so deadlines stay
    /// strictly increasing.
    pub stage_interval: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            first_stage_delay: Duration::from_millis(500),
            stage_interval: Duration::from_millis(1000),
        }
    }
}

impl IngestionConfig {
    /// Offset from acceptance for the stage at `index` (0-based).
    pub fn stage_offset(&self, index: usize) -> Duration {
        self.first_stage_delay + self.stage_interval * index as u32
    }

    /// Reject configurations that would collapse stage ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stage_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "CASE_COMPANION_INGEST_STEP_MS".to_string(),
                message: "stage interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Host configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the durable profile store.
    pub data_dir: PathBuf,
    /// HTTP/WebSocket port.
    pub port: u16,
    pub ingestion: IngestionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            port: 8080,
            ingestion: IngestionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build config from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let data_dir = std::env::var("CASE_COMPANION_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let port: u16 = std::env::var("CASE_COMPANION_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let first_ms: u64 = std::env::var("CASE_COMPANION_INGEST_FIRST_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);

        let step_ms: u64 = std::env::var("CASE_COMPANION_INGEST_STEP_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        let ingestion = IngestionConfig {
            first_stage_delay: Duration::from_millis(first_ms),
            stage_interval: Duration::from_millis(step_ms),
        };
        ingestion.validate()?;

        Ok(Self {
            data_dir,
            port,
            ingestion,
        })
    }

    /// Path of the profile store file.
    pub fn profile_store_path(&self) -> PathBuf {
        self.data_dir.join(PROFILE_STORE_FILE)
    }
}
