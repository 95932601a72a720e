//! OpenAI-compatible chat completions provider

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CompletionParams, CompletionProvider};
use crate::context::PromptTurn;
use crate::error::body_excerpt;
use crate::{Error, Result};

/// Chat completions over HTTP
pub struct OpenAiCompletion {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiCompletion {
    /// Create a provider using an injected HTTP client
    ///
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(client: Client, base_url: impl Into<String>, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for completions".to_string(),
            ));
        }

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, turns: &[PromptTurn], params: &CompletionParams) -> Result<String> {
        let params = params.clone().bounded();
        let request = ChatCompletionRequest {
            model: &params.model,
            messages: turns,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
        };

        tracing::info!(model = %params.model, turns = turns.len(), "requesting completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "completion request failed");
                Error::CompletionFailed {
                    status: None,
                    message: format!("request failed: {e}"),
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::CompletionFailed {
            status: Some(status.as_u16()),
            message: format!("failed to read response: {e}"),
        })?;

        let reply = classify(status.as_u16(), &body);
        match &reply {
            Ok(text) => tracing::info!(reply_chars = text.chars().count(), "completion received"),
            Err(e) => tracing::error!(status = %status, error = %e, "completion provider error"),
        }
        reply
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Turn a raw provider response into reply text or a classified failure
fn classify(status: u16, body: &str) -> Result<String> {
    let success = (200..300).contains(&status);

    match serde_json::from_str::<CompletionEnvelope>(body) {
        Ok(CompletionEnvelope::Failure { error }) => Err(Error::CompletionFailed {
            status: Some(status),
            message: error.describe(),
        }),
        Ok(CompletionEnvelope::Reply { choices }) if success => choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::CompletionFailed {
                status: Some(status),
                message: "malformed provider response: no reply content".to_string(),
            }),
        _ if success => Err(Error::CompletionFailed {
            status: Some(status),
            message: "malformed provider response".to_string(),
        }),
        _ => Err(Error::CompletionFailed {
            status: Some(status),
            message: body_excerpt(body),
        }),
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptTurn],
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

/// Provider response, validated on receipt
#[derive(Deserialize)]
#[serde(untagged)]
enum CompletionEnvelope {
    Failure { error: ProviderError },
    Reply { choices: Vec<Choice> },
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl ProviderError {
    fn describe(&self) -> String {
        match (&self.kind, self.message.is_empty()) {
            (Some(kind), true) => kind.clone(),
            (Some(kind), false) => format!("{kind}: {}", self.message),
            (None, true) => "provider returned an error".to_string(),
            (None, false) => self.message.clone(),
        }
    }
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
