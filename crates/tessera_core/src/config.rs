//! # Cache Configuration
//!
//! Retention, retry and worker settings, loaded once at startup from TOML.
//!
//! ```toml
//! retention_ticks = 600
//! max_resident_regions = 256
//!
//! [save_retry]
//! max_attempts = 4
//! initial_backoff_ms = 5
//!
//! [worker]
//! sweep_interval_ms = 250
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{StorageError, StorageResult};

/// Settings for the region/chunk cache.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Ticks a region may stay unreferenced before it is evicted.
    pub retention_ticks: u64,
    /// Soft cap on resident regions; sweeps evict oldest-first above it.
    pub max_resident_regions: usize,
    /// Number of load diagnostics kept for inspection.
    pub diagnostics_capacity: usize,
    /// Save retry policy.
    pub save_retry: SaveRetryConfig,
    /// Background worker settings.
    pub worker: WorkerConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_ticks: 600, // 30 seconds at 20 ticks/s
            max_resident_regions: 256,
            diagnostics_capacity: 64,
            save_retry: SaveRetryConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on malformed TOML, unknown keys or invalid values.
    pub fn from_toml_str(text: &str) -> StorageResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `InvalidConfig` otherwise.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending key.
    pub fn validate(&self) -> StorageResult<()> {
        if self.max_resident_regions == 0 {
            return Err(StorageError::InvalidConfig(
                "max_resident_regions must be at least 1".to_string(),
            ));
        }
        if self.diagnostics_capacity == 0 {
            return Err(StorageError::InvalidConfig(
                "diagnostics_capacity must be at least 1".to_string(),
            ));
        }
        if self.save_retry.max_attempts == 0 {
            return Err(StorageError::InvalidConfig(
                "save_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.save_retry.max_backoff_ms < self.save_retry.initial_backoff_ms {
            return Err(StorageError::InvalidConfig(
                "save_retry.max_backoff_ms is below initial_backoff_ms".to_string(),
            ));
        }
        if self.worker.sweep_interval_ms == 0 {
            return Err(StorageError::InvalidConfig(
                "worker.sweep_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounded exponential backoff for region saves.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaveRetryConfig {
    /// Total save attempts before the save is deferred.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_backoff_ms: u64,
    /// Delay ceiling.
    pub max_backoff_ms: u64,
}

impl Default for SaveRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 5,
            max_backoff_ms: 200,
        }
    }
}

impl SaveRetryConfig {
    /// Delay before retry number `retry` (1-based), doubled each time.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Background persistence worker settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Period between eviction sweeps.
    pub sweep_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 250,
        }
    }
}

impl WorkerConfig {
    /// Sweep period as a `Duration`.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
