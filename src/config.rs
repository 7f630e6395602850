//! Configuration types.
//!
//! Everything is read from the environment (`AppConfig::from_env`) and may be
//! overridden by CLI flags in `main`.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-pro-exp-02-05";

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Categories an email may be assigned to. The first one is the fallback.
pub const DEFAULT_EMAIL_CATEGORIES: &[&str] = &["Business", "Support", "Meeting", "Finance"];

/// Maximum chatbot turns kept in the rolling history.
pub const DEFAULT_CHATBOT_MAX_HISTORY: usize = 10;

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.95,
            top_k: 40,
            max_tokens: 1024,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Gemini API key. Only API-backed commands require it.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub generation: GenerationConfig,
    /// Directory holding the raw CSV datasets.
    pub data_dir: PathBuf,
    pub email_categories: Vec<String>,
    pub chatbot_max_history: usize,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            generation: GenerationConfig::default(),
            data_dir: PathBuf::from("./data"),
            email_categories: DEFAULT_EMAIL_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            chatbot_max_history: DEFAULT_CHATBOT_MAX_HISTORY,
            log_file: PathBuf::from("logs/app.log"),
        }
    }
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let generation = GenerationConfig {
            temperature: parse_var(&get, "COMMS_TEMPERATURE", defaults.generation.temperature)?,
            top_p: parse_var(&get, "COMMS_TOP_P", defaults.generation.top_p)?,
            top_k: parse_var(&get, "COMMS_TOP_K", defaults.generation.top_k)?,
            max_tokens: parse_var(&get, "COMMS_MAX_TOKENS", defaults.generation.max_tokens)?,
        };

        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "COMMS_TEMPERATURE".into(),
                message: format!("{} is outside 0.0..=2.0", generation.temperature),
            });
        }
        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(ConfigError::InvalidValue {
                key: "COMMS_TOP_P".into(),
                message: format!("{} is outside 0.0..=1.0", generation.top_p),
            });
        }

        let email_categories = match get("COMMS_EMAIL_CATEGORIES") {
            Some(raw) => {
                let categories: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if categories.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: "COMMS_EMAIL_CATEGORIES".into(),
                        message: "at least one category is required".into(),
                    });
                }
                categories
            }
            None => defaults.email_categories,
        };

        let chatbot_max_history: usize = parse_var(
            &get,
            "COMMS_CHATBOT_MAX_HISTORY",
            defaults.chatbot_max_history,
        )?;
        if chatbot_max_history == 0 {
            return Err(ConfigError::InvalidValue {
                key: "COMMS_CHATBOT_MAX_HISTORY".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            api_key: get("GEMINI_API_KEY").map(SecretString::from),
            model: get("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            generation,
            data_dir: get("COMMS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            email_categories,
            chatbot_max_history,
            log_file: get("COMMS_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        })
    }

    /// The API key, or an error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&SecretString, ConfigError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".into()))
    }

    /// Directory that receives processed datasets and samples.
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }
}

fn parse_var<T, F>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            }),
        None => Ok(default),
    }
}
