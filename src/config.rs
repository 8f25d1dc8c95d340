use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, RobertaError};

/// Lower bound for the per-chunk token budget
pub const MIN_MAX_TOKENS: u32 = 256;
/// Upper bound for the per-chunk token budget
pub const MAX_MAX_TOKENS: u32 = 4096;

fn default_max_tokens() -> u32 {
    1500
}

fn default_retries() -> u32 {
    1
}

fn default_request_delay_ms() -> u64 {
    1500
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4-1106-preview".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_top_p() -> f32 {
    1.0
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_history_path() -> PathBuf {
    PathBuf::from(".roberta/history.json")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum tokens per chunk, also used as the output budget of each request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Halve-and-retry attempts allowed after a token-limit failure
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Fixed pause after every chunk, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Optional bound on memoized results (unbounded when absent)
    #[serde(default)]
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the analysis history is kept between runs
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            retries: default_retries(),
            request_delay_ms: default_request_delay_ms(),
            cache_capacity: None,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RobertaError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| RobertaError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RobertaError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RobertaError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_max_tokens(self.analysis.max_tokens)?;

        if self.analysis.cache_capacity == Some(0) {
            return Err(RobertaError::Config(
                "analysis.cache_capacity must be at least 1 when set".to_string(),
            ));
        }

        if self.completion.model.trim().is_empty() {
            return Err(RobertaError::Config("completion.model must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Check that a per-chunk token budget lies in the accepted range
pub fn validate_max_tokens(max_tokens: u32) -> Result<()> {
    if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&max_tokens) {
        return Err(RobertaError::Config(format!(
            "max_tokens must be between {} and {}, got {}",
            MIN_MAX_TOKENS, MAX_MAX_TOKENS, max_tokens
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.analysis.max_tokens, 1500);
        assert_eq!(config.analysis.retries, 1);
        assert_eq!(config.completion.model, "gpt-4-1106-preview");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_tokens_bounds() {
        assert!(validate_max_tokens(256).is_ok());
        assert!(validate_max_tokens(4096).is_ok());
        assert!(validate_max_tokens(255).is_err());
        assert!(validate_max_tokens(4097).is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[analysis]\nmax_tokens = 2048\n").unwrap();
        assert_eq!(config.analysis.max_tokens, 2048);
        assert_eq!(config.analysis.request_delay_ms, 1500);
        assert_eq!(config.completion.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.session.history_path, PathBuf::from(".roberta/history.json"));
    }

    #[test]
    fn test_from_file_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analysis]\nmax_tokens = 100\n").unwrap();

        assert!(matches!(Config::from_file(&path), Err(RobertaError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.analysis.cache_capacity = Some(64);
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.analysis.cache_capacity, Some(64));
        assert_eq!(loaded.completion.endpoint, "https://api.openai.com/v1");
    }
}
