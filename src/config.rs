//! Application configuration
//!
//! Values come from the environment with sensible defaults so the library can
//! be embedded by a server or driven from tests without a config file.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn from_str(s: &str) -> Option<Provider> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Some(Provider::Gemini),
            "anthropic" => Some(Provider::Anthropic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: Provider,
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Overrides the provider's default model
    pub model: Option<String>,
    /// Upper bound for a single text-generation call
    pub llm_timeout_secs: u64,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_retention_days: i64,
}

fn home_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".habitloop")
}

fn default_db_path() -> PathBuf {
    home_dir().join("habitloop.db")
}

fn default_log_dir() -> PathBuf {
    home_dir().join("logs")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            gemini_api_key: None,
            anthropic_api_key: None,
            model: None,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            db_path: default_db_path(),
            log_dir: default_log_dir(),
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

impl AppConfig {
    /// Build a config from `HABITLOOP_*` variables and the provider key variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but with an injectable lookup, so tests don't touch
    /// the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(provider) = lookup("HABITLOOP_PROVIDER") {
            config.provider = Provider::from_str(&provider)
                .ok_or_else(|| format!("Unknown provider '{}'", provider))?;
        }
        config.gemini_api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        config.anthropic_api_key = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty());
        config.model = lookup("HABITLOOP_MODEL").filter(|m| !m.trim().is_empty());

        if let Some(secs) = lookup("HABITLOOP_LLM_TIMEOUT_SECS") {
            config.llm_timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| format!("Invalid HABITLOOP_LLM_TIMEOUT_SECS '{}'", secs))?;
        }
        if let Some(path) = lookup("HABITLOOP_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("HABITLOOP_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(days) = lookup("HABITLOOP_LOG_RETENTION_DAYS") {
            config.log_retention_days = days
                .trim()
                .parse()
                .map_err(|_| format!("Invalid HABITLOOP_LOG_RETENTION_DAYS '{}'", days))?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.llm_timeout_secs == 0 {
            return Err("llm_timeout_secs must be greater than zero".to_string());
        }
        if self.log_retention_days < 1 {
            return Err("log_retention_days must be at least 1".to_string());
        }
        if self.api_key().is_none() {
            return Err(format!("No API key configured for provider '{}'", self.provider.as_str()));
        }
        Ok(())
    }

    /// Key for the selected provider
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }

    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, Provider::Gemini) => DEFAULT_GEMINI_MODEL,
            (None, Provider::Anthropic) => DEFAULT_ANTHROPIC_MODEL,
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}
