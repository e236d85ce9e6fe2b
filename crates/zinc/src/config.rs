//! Application configuration.

use serde::{Deserialize, Serialize};

/// Sizing of the pools an [`App`](crate::App) owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of idle request contexts kept for reuse.
    pub context_pool_size: usize,
    /// Maximum number of idle path-segment buffers kept for reuse.
    pub segment_pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context_pool_size: 64,
            segment_pool_size: 64,
        }
    }
}

impl Config {
    /// Parses a configuration from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
