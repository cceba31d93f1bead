use crate::config::Config;
use crate::i18n::{Language, SuggestionValidator};
use crate::metrics::ServiceMetrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces a suggested translation for one piece of text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, language: Language) -> Result<String>;
}

/// OpenAI Chat Completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

fn build_prompt(text: &str, language_name: &str) -> String {
    format!(
        "Translate the following text to {} language. Keep the same meaning and tone. \
         Only return the translation, without any additional text or explanations:\n\n{}",
        language_name, text
    )
}

/// Chat-completion backed [`Translator`]. One request per call, no retries.
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    metrics: Arc<ServiceMetrics>,
}

impl OpenAiTranslator {
    pub fn new(client: reqwest::Client, config: &Config, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            client,
            api_url: config.openai_api_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            temperature: config.openai_temperature,
            max_tokens: config.suggestion_max_tokens,
            metrics,
        }
    }

    fn build_request(&self, text: &str, language: Language) -> ChatRequest {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.model);

        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: build_prompt(text, language.name()),
            }],
            max_completion_tokens: if is_reasoning { 16000 } else { self.max_tokens },
            temperature: if is_reasoning { None } else { Some(self.temperature) },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
        }
    }

    async fn request(&self, text: &str, language: Language) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY is not configured")?;

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&self.build_request(text, language))
            .send()
            .await
            .context("Failed to send translation request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            anyhow::bail!("OpenAI API error during translation ({}): {}", status, body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI translation response")?;

        let translated = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .context("OpenAI translation response contained no choices")?;

        Ok(translated)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str, language: Language) -> Result<String> {
        // Base documents are already in the canonical language
        if language.is_canonical() {
            return Ok(text.to_string());
        }

        self.metrics.record_suggestion_call();
        debug!("Requesting {} suggestion for {} chars", language, text.len());

        let translated = match self.request(text, language).await {
            Ok(translated) => translated,
            Err(e) => {
                self.metrics.record_suggestion_failure();
                return Err(e);
            }
        };

        let validation = SuggestionValidator::validate(text, &translated);
        if validation.has_warnings() {
            warn!(
                "Suggestion validation warnings for {} ({}): {:?}",
                language.name(),
                language.code(),
                validation.warnings
            );
        }
        if validation.has_errors() {
            warn!(
                "Suggestion validation errors for {} ({}): {:?}",
                language.name(),
                language.code(),
                validation.errors
            );
        }

        Ok(translated)
    }
}
