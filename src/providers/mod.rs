/*!
 * Chat clients for the LLM services used by the translator.
 *
 * - Ollama: local LLM server (`/api/chat`, falling back to `/api/generate`)
 * - OpenAI: any OpenAI-compatible `chat/completions` endpoint
 * - Mock: scripted responses for tests
 *
 * Providers make exactly one request per call; retrying is left to the caller.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

pub mod mock;
pub mod ollama;
pub mod openai;

/// One system + user exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    /// Model to use; an empty string means the provider's default
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl ChatPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            system: system.into(),
            user: user.into(),
            temperature: 0.2,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Common trait for all LLM providers
#[async_trait]
pub trait ChatProvider: Send + Sync + Debug {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Model used when a prompt does not name one; reported at startup
    fn default_model(&self) -> &str;

    /// Send one prompt and return the assistant's text
    async fn chat(&self, prompt: &ChatPrompt) -> Result<String, ProviderError>;

    /// Check that the service is reachable
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Map an HTTP error status to a provider error
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        code => ProviderError::ApiError {
            status_code: code,
            message: body,
        },
    }
}

/// Map a transport error to a provider error
pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_connect() || err.is_timeout() {
        ProviderError::ConnectionError(err.to_string())
    } else {
        ProviderError::RequestFailed(err.to_string())
    }
}

/// Build the provider selected in the translation config
pub fn build_provider(config: &TranslationConfig) -> anyhow::Result<Arc<dyn ChatProvider>> {
    let timeout_secs = config.get_timeout_secs();
    let provider: Arc<dyn ChatProvider> = match config.provider {
        TranslationProvider::Ollama => Arc::new(ollama::Ollama::from_url(
            config.get_endpoint(),
            config.get_model(),
            timeout_secs,
        )?),
        TranslationProvider::OpenAI | TranslationProvider::LMStudio => Arc::new(openai::OpenAI::new(
            config.get_endpoint(),
            config.get_api_key(),
            config.get_model(),
            timeout_secs,
        )?),
    };
    Ok(provider)
}
