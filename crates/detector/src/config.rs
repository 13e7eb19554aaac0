use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_OUTLINE: &str = "3px solid #3b82f6";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Covers loading the target and waiting for the click
    pub timeout_ms: u64,
    pub load_poll_ms: u64,
    pub highlight_outline: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            load_poll_ms: 500,
            highlight_outline: DEFAULT_OUTLINE.to_string(),
        }
    }
}

impl DetectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn load_poll(&self) -> Duration {
        Duration::from_millis(self.load_poll_ms.max(1))
    }
}
