use crate::error::CompletionError;
use crate::traits::CompletionClient;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

const BACKEND: &str = "chat-completions";

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint, such as Groq.
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let base = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))?;
        let endpoint = base.join("chat/completions")?;
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(endpoint = %self.endpoint, model = %self.model, "sending completion request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CompletionError::Backend {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        extract_message_content(&parsed)
    }
}

fn extract_message_content(parsed: &Value) -> Result<String, CompletionError> {
    let content = parsed
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if content.is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(content.to_string())
}
