
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{ChatMessage, ChatModel};
use crate::config::Config;
use crate::http::{HttpClient, join_endpoint};
use crate::{RagError, Result};

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    base_url: Url,
    api_key: String,
    model: String,
    temperature: f32,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.openai.api_key.clone().ok_or_else(|| {
            RagError::Config(
                "OpenAI API key is not set (openai.api_key or OPENAI_API_KEY)".to_string(),
            )
        })?;

        let base_url = config
            .openai_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        info!("OpenAI chat model {} initialized", config.openai.chat_model);

        Ok(Self {
            base_url,
            api_key,
            model: config.openai.chat_model.clone(),
            temperature: config.openai.temperature,
            http: HttpClient::new(Duration::from_secs(config.openai.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for OpenAiChat {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = join_endpoint(&self.base_url, "chat/completions")?;
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        let auth = format!("Bearer {}", self.api_key);

        debug!(
            "Requesting completion from {} with {} messages",
            self.model,
            messages.len()
        );

        let response: CompletionResponse =
            self.http
                .post_json(&url, &[("Authorization", auth.as_str())], &request)?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            RagError::RemoteUnavailable(format!("Model {} returned no choices", self.model))
        })?;

        if choice.finish_reason.as_deref() == Some("length") {
            warn!("Completion from {} was truncated at the token limit", self.model);
        }

        choice.message.content.ok_or_else(|| {
            RagError::RemoteUnavailable(format!("Model {} returned an empty message", self.model))
        })
    }
}
