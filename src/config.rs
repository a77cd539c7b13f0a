//! Search tunables

use serde::Deserialize;
use std::time::Duration;

use crate::error::Result;

/// Quiet window before a search is run
pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 200;
/// Default max results per query
pub const DEFAULT_MAX_RESULTS: usize = 100;
/// Longest n-gram indexed, which is also the longest query fragment matched in one term
pub const DEFAULT_RESOLUTION: usize = 9;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSettings {
    pub debounce_delay_ms: u64,
    pub max_results: usize,
    pub resolution: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_delay_ms: DEFAULT_DEBOUNCE_DELAY_MS,
            max_results: DEFAULT_MAX_RESULTS,
            resolution: DEFAULT_RESOLUTION,
        }
    }
}

impl SearchSettings {
    /// Parse settings from JSON, missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: SearchSettings = serde_json::from_str(json)?;
        // A zero resolution would index nothing
        settings.resolution = settings.resolution.max(1);
        Ok(settings)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }
}
