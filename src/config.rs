use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{DoctransError, Result};

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

fn default_workspace_dir() -> PathBuf {
    std::env::temp_dir().join("doctrans")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub translate: TranslateConfig,
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Base URL of the Gemini API
    pub endpoint: String,
    /// Model used for `generateContent`
    pub model: String,
    /// API key; falls back to `GEMINI_API_KEY` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Target language used when none is given on the command line
    pub default_target_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding uploaded and translated working files
    pub dir: PathBuf,
    /// Working files older than this are removed by `sweep`
    pub stale_after_hours: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            default_target_language: "Japanese".to_string(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: default_workspace_dir(),
            stale_after_hours: 24,
        }
    }
}

impl TranslateConfig {
    /// API key from the config file, else from the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key_with(&self, env_value: Option<String>) -> Result<String> {
        self.api_key
            .clone()
            .into_iter()
            .chain(env_value)
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
            .ok_or(DoctransError::MissingApiKey)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DoctransError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| DoctransError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DoctransError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DoctransError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
