//! Speech-to-text (STT) processing

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};

use super::Transcriber;
use crate::error::body_excerpt;
use crate::{Error, Result};

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes recorded audio to text with `OpenAI` Whisper
pub struct SpeechToText {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl SpeechToText {
    /// Create a new STT instance using an injected HTTP client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), mime, "starting Whisper transcription");

        let part = Part::bytes(audio.to_vec())
            .file_name(format!("audio.{}", file_extension(mime)))
            .mime_str(mime)
            .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::TranscriptionFailed(format!("request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::TranscriptionFailed(format!(
                "Whisper API error {status}: {}",
                body_excerpt(&body)
            )));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::TranscriptionFailed(format!("malformed provider response: {e}"))
        })?;

        let text = result.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::TranscriptionFailed(
                "no speech detected in recording".to_string(),
            ));
        }

        tracing::info!(transcript_chars = text.chars().count(), "transcription complete");
        Ok(text)
    }
}

/// File extension Whisper uses to sniff the container
fn file_extension(mime: &str) -> &'static str {
    match mime.split(';').next().unwrap_or_default().trim() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/ogg" => "ogg",
        "audio/flac" => "flac",
        _ => "webm",
    }
}
