use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{ChatPrompt, ChatProvider, status_error, transport_error};

/// Client for OpenAI-compatible `chat/completions` APIs (OpenAI, DeepSeek, LM Studio, ...)
#[derive(Debug)]
pub struct OpenAI {
    client: Client,
    /// Base URL including the version path, e.g. `https://api.openai.com/v1`
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Debug, Deserialize)]
struct CompletionContent {
    #[serde(default)]
    content: Option<String>,
}

const MAX_TOKENS: u32 = 1024;

impl OpenAI {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint).map_err(|e| anyhow::anyhow!("Invalid API endpoint '{}': {}", endpoint, e))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl ChatProvider for OpenAI {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
        let model = if prompt.model.is_empty() { &self.model } else { &prompt.model };
        let request = CompletionRequest {
            model,
            messages: vec![
                CompletionMessage {
                    role: "system",
                    content: &prompt.system,
                },
                CompletionMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let mut builder = self.client.post(self.completions_url()).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Chat completion error ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse chat completion: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ProviderError::ParseError("Chat completion has no choices".to_string()))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.chat(&ChatPrompt::new("Reply with OK.", "ping")).await.map(|_| ())
    }
}
