use crate::common::http::{build_client, normalize_base_url, transport_error};
use crate::traits::TextGenerator;
use async_trait::async_trait;
use domain::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI 兼容接口的根地址，例如 `https://api.openai.com`
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `POST /v1/chat/completions`，单轮 user 消息
pub struct ChatCompletionsGenerator {
    http: reqwest::Client,
    config: LlmConfig,
    endpoint: String,
}

impl ChatCompletionsGenerator {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let base = normalize_base_url(&config.base_url);
        if base.is_empty() {
            return Err(Error::Config("llm.base_url is not configured".into()));
        }
        Ok(Self {
            http: build_client(config.timeout)?,
            endpoint: format!("{}/v1/chat/completions", base),
            config,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let mut req = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let resp: ChatResponse = req
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| transport_error("text generation", e))?
            .json()
            .await
            .map_err(|e| Error::Generation(format!("unreadable completion: {}", e)))?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(Error::Generation("model returned empty content".into()));
        }
        Ok(text)
    }
}
