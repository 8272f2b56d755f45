//! Question Plus configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Credential value shipped in sample env files; treated as "not configured"
pub const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// History persistence
    pub history: HistoryConfig,

    /// Prompt template overrides
    pub prompts: PromptsConfig,

    /// Question analysis tuning
    pub analysis: AnalysisConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Credential state of the configured provider; never fails
    pub fn credential_status(&self) -> CredentialStatus {
        self.llm.credential_status()
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => Some(p.clone()),
            None => Self::search_paths().into_iter().find(|p| p.exists()),
        }?;
        Self::load_from_file(path).ok()?.log_level
    }

    /// Project-local config first, then the user config
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".questionplus.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("questionplus").join("questionplus.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Classify the credential named by `api_key_env`
    pub fn credential_status(&self) -> CredentialStatus {
        match std::env::var(&self.api_key_env) {
            Ok(key) if key.trim() == PLACEHOLDER_API_KEY => CredentialStatus::Placeholder,
            Ok(key) if !key.trim().is_empty() => CredentialStatus::Configured,
            _ => CredentialStatus::Missing,
        }
    }

    /// The configured credential, if any
    ///
    /// Unset, blank and placeholder values all count as absent.
    pub fn api_key(&self) -> Option<String> {
        if self.credential_status() != CredentialStatus::Configured {
            debug!(env = %self.api_key_env, "api_key: credential absent or placeholder");
            return None;
        }
        std::env::var(&self.api_key_env).ok().map(|k| k.trim().to_string())
    }
}

/// Whether an LLM credential is available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Configured,
    Missing,
    Placeholder,
}

impl CredentialStatus {
    pub fn is_configured(&self) -> bool {
        matches!(self, CredentialStatus::Configured)
    }
}

/// History persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Directory holding the history collection
    pub dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: historystore::default_history_dir(),
        }
    }
}

/// Prompt template configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory searched for `{name}.pmt` overrides before the embedded defaults
    pub dir: Option<PathBuf>,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: dirs::config_dir().map(|d| d.join("questionplus").join("prompts")),
        }
    }
}

/// Question analysis tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fewest customization options to request in detailed mode
    #[serde(rename = "min-options")]
    pub min_options: usize,

    /// Most customization options to request in detailed mode
    #[serde(rename = "max-options")]
    pub max_options: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_options: 3,
            max_options: 6,
        }
    }
}
