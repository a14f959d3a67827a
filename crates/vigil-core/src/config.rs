use std::time::Duration;

use serde::Deserialize;

/// Storage-related agent configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// Hours a stored trace is retained. Empty query results whose window
    /// predates this threshold are flagged expired rather than merely empty.
    pub retention_hours: u64,
    /// Transactions at least this slow qualify for storage without an error.
    pub slow_threshold_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            retention_hours: 24 * 7,
            slow_threshold_ms: 2_000,
        }
    }
}

impl StorageConfig {
    pub fn retention_millis(&self) -> u64 {
        self.retention_hours * 60 * 60 * 1000
    }

    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}
