use std::time::Duration;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct NarrationConfig {
    /// Number of leading characters of trimmed narration used as its
    /// deduplication key
    pub dedup_prefix_chars: usize,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self { dedup_prefix_chars: 64 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct WatchdogConfig {
    /// Seconds without any feed event before the run is force terminated
    pub idle_timeout_secs: u64,
}

impl WatchdogConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { idle_timeout_secs: 120 }
    }
}
