//! OpenAI chat-completions client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{Classifier, INSTRUCTION};
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Classifier backed by the OpenAI chat-completions API.
#[derive(Clone)]
pub struct OpenAiClassifier {
    base_url: String,
    api_key: SecretString,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, text: &str) -> Result<String, ClassifierError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::RequestFailed {
                provider: "openai".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClassifierError::RequestFailed {
                provider: "openai".into(),
                reason: format!("{status} {body}"),
            });
        }

        let data: ChatResponse =
            resp.json()
                .await
                .map_err(|e| ClassifierError::InvalidResponse {
                    provider: "openai".into(),
                    reason: e.to_string(),
                })?;

        let content = data
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ClassifierError::InvalidResponse {
                provider: "openai".into(),
                reason: "no choices in response".into(),
            })?;

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}
