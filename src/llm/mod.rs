//! Completion gateway: turn sequence in, assistant reply out
//!
//! Exactly one provider request per call. No retries, no streaming; provider
//! failures surface as `Error::CompletionFailed`.

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::PromptTurn;
use crate::Result;

pub use openai::OpenAiCompletion;

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Sampling parameters for a completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Model identifier
    pub model: String,
    /// Cap on generated tokens; the reply may be shorter
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 150,
            temperature: 0.7,
            presence_penalty: 0.6,
            frequency_penalty: 0.6,
        }
    }
}

impl CompletionParams {
    /// Clamp every parameter into the range the provider accepts
    #[must_use]
    pub fn bounded(mut self) -> Self {
        self.max_tokens = self.max_tokens.max(1);
        self.temperature = clamp_finite(self.temperature, 0.0, 2.0, 0.7);
        self.presence_penalty = clamp_finite(self.presence_penalty, -2.0, 2.0, 0.0);
        self.frequency_penalty = clamp_finite(self.frequency_penalty, -2.0, 2.0, 0.0);
        self
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// A chat-completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Request a reply for `turns`
    ///
    /// # Errors
    ///
    /// Returns `CompletionFailed` if the provider rejects the request or its
    /// response carries no reply text
    async fn complete(&self, turns: &[PromptTurn], params: &CompletionParams) -> Result<String>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}
