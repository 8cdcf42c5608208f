//! Simulation configuration.

use crate::error::SimResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything the runner and scheduler can be tuned with. Loaded from
/// a JSON file or built from defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Milliseconds between tick rounds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Maximum per-pet tick commands in flight at once, across all
    /// rounds.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Consulted by the runner before starting the scheduler. The
    /// scheduler itself never reads this flag.
    #[serde(default)]
    pub start_paused: bool,
}

fn default_tick_interval_ms() -> u64 {
    10_000
}

fn default_concurrency() -> usize {
    8
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            concurrency: default_concurrency(),
            start_paused: false,
        }
    }
}

impl SimConfig {
    pub fn load(path: &str) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
