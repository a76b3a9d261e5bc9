//! Monitor configuration (TOML, with environment overrides).
//!
//! ```toml
//! hang_threshold_ms = 10000
//! recheck_interval_ms = 30000
//! workers = 2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LapseError, Result};

pub const ENV_HANG_THRESHOLD_MS: &str = "LAPSE_HANG_THRESHOLD_MS";
pub const ENV_WORKERS: &str = "LAPSE_WORKERS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// How long a request may run before it is reported. Negative clamps to 0.
    pub hang_threshold_ms: i64,

    /// When set, a reported request is re-armed with this delay so a request
    /// that stays hung is reported again.
    pub recheck_interval_ms: Option<i64>,

    /// Consumer tasks draining the queue.
    pub workers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            hang_threshold_ms: 10_000,
            recheck_interval_ms: None,
            workers: 1,
        }
    }
}

fn clamp_ms(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

impl MonitorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Apply `LAPSE_HANG_THRESHOLD_MS` / `LAPSE_WORKERS` when set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(raw) = std::env::var(ENV_HANG_THRESHOLD_MS) {
            self.hang_threshold_ms = raw
                .trim()
                .parse()
                .map_err(|_| LapseError::Config(format!("{ENV_HANG_THRESHOLD_MS}={raw} is not an integer")))?;
        }
        if let Ok(raw) = std::env::var(ENV_WORKERS) {
            self.workers = raw
                .trim()
                .parse()
                .map_err(|_| LapseError::Config(format!("{ENV_WORKERS}={raw} is not a count")))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(LapseError::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn hang_threshold(&self) -> Duration {
        clamp_ms(self.hang_threshold_ms)
    }

    pub fn recheck_interval(&self) -> Option<Duration> {
        self.recheck_interval_ms.map(clamp_ms)
    }
}
