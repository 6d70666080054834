//! Generative-text service boundary.
//!
//! One call in, one text completion out. The service is treated as slow
//! and unreliable; callers own the degrade-not-fail policy.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::InsightsConfig;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a completion for the prompt pair. Implementations surface
    /// transport and status failures as errors; they do not retry.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completions client.
pub struct HttpTextGenerator {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl HttpTextGenerator {
    pub fn new(config: &InsightsConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("vantage/0.1.0")
            .timeout(config.timeout())
            .build()
            .context("failed to build HTTP client for the generative-text service")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "response_format": {"type": "json_object"},
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("generative-text request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("generative-text service returned {status}: {body}");
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("failed to parse generative-text response")?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("generative-text response contained no choices"))
    }
}
