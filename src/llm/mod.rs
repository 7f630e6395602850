//! LLM integration for comms-assist.
//!
//! The only backend is Google's Gemini REST API (`GeminiProvider`).
//! `GeminiClient` layers prompt helpers and usage accounting on top of any
//! `LlmProvider`, which keeps the processors testable with mock providers.

pub mod client;
pub mod gemini;
pub mod json;
pub mod provider;

pub use client::{ApiSentiment, GeminiClient, GenerationOverrides, UsageTotals};
pub use gemini::GeminiProvider;
pub use provider::*;

use std::sync::Arc;

use secrecy::SecretString;

use crate::config::AppConfig;
use crate::error::{ConfigError, LlmError};

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

impl LlmConfig {
    /// Take provider settings from the app config; fails without an API key.
    pub fn from_app(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: config.require_api_key()?.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
        })
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = GeminiProvider::new(
        config.api_key.clone(),
        config.model.clone(),
        config.base_url.clone(),
    )?;
    tracing::info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_constructs_without_network() {
        let config = LlmConfig {
            api_key: SecretString::from("test-key".to_string()),
            model: "gemini-2.0-flash".to_string(),
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
        };
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().model_name(), "gemini-2.0-flash");
    }

    #[test]
    fn test_llm_config_requires_api_key() {
        let config = AppConfig::default();
        assert!(LlmConfig::from_app(&config).is_err());

        let config = AppConfig {
            api_key: Some(SecretString::from("k".to_string())),
            ..AppConfig::default()
        };
        let llm = LlmConfig::from_app(&config).unwrap();
        assert_eq!(llm.model, crate::config::DEFAULT_MODEL);
    }
}
