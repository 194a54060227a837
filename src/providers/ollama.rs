use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{ChatPrompt, ChatProvider, status_error, transport_error};

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API, without trailing slash
    base_url: String,
    /// Model used when a prompt names none
    model: String,
    /// HTTP client for making requests
    client: Client,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    pub content: String,
}

/// Chat request for `/api/chat`
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    stream: bool,
}

/// Chat response from `/api/chat`
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: String,
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
}

/// Request for `/api/generate`, used by servers without chat support
#[derive(Debug, Serialize)]
pub struct GenerationRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

const NUM_PREDICT: u32 = 1024;

impl ChatRequest {
    pub fn from_prompt(model: impl Into<String>, prompt: &ChatPrompt) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            options: Some(GenerationOptions {
                temperature: Some(prompt.temperature),
                num_predict: Some(NUM_PREDICT),
            }),
            stream: false,
        }
    }
}

impl GenerationRequest {
    /// System and user text folded into one prompt
    pub fn from_prompt(model: impl Into<String>, prompt: &ChatPrompt) -> Self {
        Self {
            model: model.into(),
            prompt: format!("[SYSTEM]\n{}\n\n[USER]\n{}", prompt.system, prompt.user),
            options: Some(GenerationOptions {
                temperature: Some(prompt.temperature),
                num_predict: Some(NUM_PREDICT),
            }),
            stream: false,
        }
    }
}

impl Ollama {
    /// Create a client from a base URL such as `http://localhost:11434`
    pub fn from_url(url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let url = url.into();
        let parsed = Url::parse(&url).map_err(|e| anyhow::anyhow!("Invalid Ollama endpoint '{}': {}", url, e))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    fn model_for<'a>(&'a self, prompt: &'a ChatPrompt) -> &'a str {
        if prompt.model.is_empty() { &self.model } else { &prompt.model }
    }

    /// Chat endpoint; `Ok(None)` when the server lacks `/api/chat`
    async fn chat_endpoint(&self, prompt: &ChatPrompt) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest::from_prompt(self.model_for(prompt), prompt);

        let response = self.client.post(&url).json(&request).send().await.map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to read Ollama response: {}", e)))?;
        parse_chat_body(&response_text).map(Some)
    }

    async fn generate_endpoint(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerationRequest::from_prompt(self.model_for(prompt), prompt);

        let response = self.client.post(&url).json(&request).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama generate error ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }
        let body: GenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Ollama generate response: {}", e)))?;
        Ok(body.response.trim().to_string())
    }

    /// Server version, used as a connectivity check
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text));
        }
        let body: VersionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(body.version)
    }
}

/// Extract assistant text from a chat body.
///
/// Some servers stream JSON lines even with `stream: false`; in that case the
/// message parts of every line are concatenated.
pub fn parse_chat_body(body: &str) -> Result<String, ProviderError> {
    if let Ok(parsed) = serde_json::from_str::<ChatResponse>(body) {
        return Ok(parsed.message.content.trim().to_string());
    }

    let mut content = String::new();
    let mut parsed_any = false;
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
            parsed_any = true;
            if let Some(part) = value.pointer("/message/content").and_then(|v| v.as_str()) {
                content.push_str(part);
            }
        }
    }

    if parsed_any {
        debug!("Parsed streamed Ollama chat response");
        Ok(content.trim().to_string())
    } else {
        let preview: String = body.chars().take(200).collect();
        Err(ProviderError::ParseError(format!(
            "Ollama chat response is not valid JSON: {}",
            preview
        )))
    }
}

#[async_trait]
impl ChatProvider for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
        match self.chat_endpoint(prompt).await? {
            Some(content) if !content.is_empty() => Ok(content),
            Some(_) => {
                warn!("Ollama chat returned no content, retrying through /api/generate");
                self.generate_endpoint(prompt).await
            }
            None => {
                debug!("Ollama server has no /api/chat, using /api/generate");
                self.generate_endpoint(prompt).await
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let version = self.version().await?;
        debug!("Connected to Ollama {}", version);
        Ok(())
    }
}
