//! Language model abstraction
//!
//! Provides a unified interface over text-generation providers:
//! - Anthropic Messages API
//! - Scripted mock for tests and local development
//!
//! Retries and outbound throttling live here so callers only see a single
//! `complete` call.

mod anthropic;
pub mod json;
mod mock;
mod rate_gate;
mod retry;

pub use anthropic::AnthropicClient;
pub use json::extract_json_object;
pub use mock::MockLanguageModel;
pub use rate_gate::RateGate;
pub use retry::RetryPolicy;

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::plan::TokenUsage;
use async_trait::async_trait;
use std::sync::Arc;

/// One prompt sent to a model
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text returned by a model plus token accounting
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Trait for text generation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion, including any retries the implementation performs
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create a language model based on configuration
pub fn create_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "anthropic" => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| AppError::Configuration {
                    message: "llm.api_key is required for the anthropic provider".to_string(),
                })?;
            Ok(Arc::new(AnthropicClient::new(config, api_key)?))
        }
        "mock" => {
            tracing::warn!("Using mock language model");
            Ok(Arc::new(MockLanguageModel::default()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown LLM provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_requires_key() {
        let config = LlmConfig::default();
        let err = create_language_model(&config).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".into(),
            ..Default::default()
        };
        assert!(create_language_model(&config).is_err());
    }

    #[test]
    fn test_mock_provider() {
        let config = LlmConfig {
            provider: "mock".into(),
            ..Default::default()
        };
        let model = create_language_model(&config).unwrap();
        assert_eq!(model.model_name(), "mock-model");
    }
}
