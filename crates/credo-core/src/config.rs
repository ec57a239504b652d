//! Store configuration loaded from `credo.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size when the caller does not set one.
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    /// Hard cap on the page size; larger requests are clamped.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Depth bound when the caller does not set one.
    #[serde(default = "default_max_depth")]
    pub default_max_depth: usize,
    /// Hard cap on traversal depth; larger requests are clamped.
    #[serde(default = "default_depth_cap")]
    pub depth_cap: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
            depth_cap: default_depth_cap(),
        }
    }
}

const fn default_limit() -> u32 {
    50
}

const fn default_max_limit() -> u32 {
    1000
}

const fn default_max_depth() -> usize {
    5
}

const fn default_depth_cap() -> usize {
    32
}

/// Load configuration from a TOML file; a missing file yields defaults.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<StoreConfig> {
    if !path.exists() {
        return Ok(StoreConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
}
