//! Configuration for the history CLI

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Records shown by `hs list` when no `--limit` is given
pub const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the history collection; shared with `qp`'s `history.dir`
    #[serde(rename = "store-path")]
    pub store_path: PathBuf,

    /// Default number of records shown by `hs list`
    #[serde(rename = "list-limit")]
    pub list_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: crate::default_history_dir(),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. A broken file found on the search path
    /// is skipped with a warning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Skipping config {}: {:#}", candidate.display(), e),
            }
        }

        info!("No historystore config found, using defaults");
        Ok(Self::default())
    }

    /// `./.historystore.yml`, then `<config_dir>/questionplus/historystore.yml`
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".historystore.yml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("questionplus").join("historystore.yml"));
        }
        paths
    }

    fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Config::load_from_file: called");
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
