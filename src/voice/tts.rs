//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use super::{SpeechParams, SpeechProvider};
use crate::error::body_excerpt;
use crate::{Error, Result};

/// Synthesizes speech through an `OpenAI`-compatible `/audio/speech` endpoint
pub struct OpenAiSpeech {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiSpeech {
    /// Create a new TTS instance using an injected HTTP client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(client: Client, base_url: impl Into<String>, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.base_url)
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeech {
    async fn synthesize(&self, text: &str, params: &SpeechParams) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
            speed: f32,
        }

        let params = params.clone().bounded();
        let request = TtsRequest {
            model: &params.model,
            input: text,
            voice: &params.voice,
            response_format: params.format.as_str(),
            speed: params.speed,
        };

        tracing::debug!(
            model = %params.model,
            voice = %params.voice,
            input_chars = text.chars().count(),
            "requesting speech"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "TTS request failed");
                Error::SpeechSynthesisFailed {
                    status: None,
                    message: format!("request failed: {e}"),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TTS API error");
            return Err(Error::SpeechSynthesisFailed {
                status: Some(status.as_u16()),
                message: body_excerpt(&body),
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::SpeechSynthesisFailed {
                status: Some(status.as_u16()),
                message: format!("failed to read audio: {e}"),
            })?;

        if audio.is_empty() {
            return Err(Error::SpeechSynthesisFailed {
                status: Some(status.as_u16()),
                message: "provider returned no audio".to_string(),
            });
        }

        tracing::info!(audio_bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
