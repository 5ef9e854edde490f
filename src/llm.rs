//! Language-model abstraction for the two completion call sites:
//! intent classification and answer generation.
//!
//! [`LanguageModel`] is the seam the chat pipeline depends on; the concrete
//! providers (OpenAI chat completions, Ollama generate) share the retry and
//! backoff behavior of the embedding clients.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::embedding::post_with_backoff;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;
    /// Complete a prompt. May fail with rate-limit, timeout, or
    /// malformed-output conditions after retries are exhausted.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

/// Create the model used for answer generation.
pub fn create_chat_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    create_model(config, &config.chat_model)
}

/// Create the model used for intent classification. Defaults to the chat
/// model when no dedicated classification model is configured.
pub fn create_classification_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    create_model(config, config.classification_model())
}

fn create_model(config: &LlmConfig, model: &str) -> Result<Box<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiChatModel::new(config, model)?)),
        "ollama" => Ok(Box::new(OllamaChatModel::new(config, model)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ OpenAI ============

pub struct OpenAiChatModel {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: model.to_string(),
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let json = post_with_backoff(&self.client, &url, Some(&self.api_key), &body, self.max_retries)
            .await?;

        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid chat completion response: missing content"))
    }
}

// ============ Ollama ============

pub struct OllamaChatModel {
    model: String,
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaChatModel {
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: model.to_string(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": temperature },
        });

        let json = post_with_backoff(&self.client, &url, None, &body, self.max_retries).await?;

        json.get("response")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}
