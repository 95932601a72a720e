//! Voice function routes: text-to-speech, speech-to-text and full voice turns

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use super::chat::ChatRequest;
use super::error::ApiError;
use crate::codec;
use crate::voice::{SpeechOverrides, Transcriber};
use crate::Error;

/// Content type assumed for recordings that do not declare one
const DEFAULT_RECORDING_MIME: &str = "audio/webm";

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/text-to-speech", post(text_to_speech))
        .route("/speech-to-text", post(speech_to_text))
        .route("/voice-chat", post(voice_chat))
        .with_state(state)
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    pub speed: Option<f32>,
    pub model: Option<String>,
    pub voice: Option<String>,
}

/// Synthesis response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioResponse {
    /// Base64 audio
    pub audio_content: String,
}

/// Synthesize text to speech
async fn text_to_speech(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Json<AudioResponse>, ApiError> {
    let Json(request) = payload?;
    let overrides = SpeechOverrides {
        speed: request.speed,
        model: request.model,
        voice: request.voice,
    };

    let audio = state.journal.speak(&request.text, &overrides).await?;

    Ok(Json(AudioResponse {
        audio_content: audio.content,
    }))
}

/// Transcription request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    /// Base64 audio or a `data:` URL
    pub audio: String,
    /// Content type when `audio` is bare base64
    pub mime_type: Option<String>,
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe recorded audio to text
async fn speech_to_text(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<TranscribeRequest>, JsonRejection>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let Json(request) = payload?;
    let transcriber = state.transcriber.as_ref().ok_or_else(|| {
        Error::Config("speech-to-text is not configured".to_string())
    })?;

    let (audio, mime) = decode_recording(&request)?;
    let text = transcriber.transcribe(&audio, &mime).await?;

    Ok(Json(TranscribeResponse { text }))
}

fn decode_recording(request: &TranscribeRequest) -> crate::Result<(Vec<u8>, String)> {
    if request.audio.trim().is_empty() {
        return Err(Error::InvalidInput("audio is required".to_string()));
    }

    let audio = codec::decode(&request.audio)?;
    if audio.is_empty() {
        return Err(Error::InvalidInput("audio is empty".to_string()));
    }

    let mime = codec::data_url_mime(&request.audio)
        .or(request.mime_type.as_deref())
        .unwrap_or(DEFAULT_RECORDING_MIME)
        .trim()
        .to_string();
    if !is_valid_mime(&mime) {
        return Err(Error::InvalidInput(format!("invalid mimeType '{mime}'")));
    }

    Ok((audio, mime))
}

/// `type/subtype` with optional `;` parameters
fn is_valid_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    let is_token = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    };

    essence
        .split_once('/')
        .is_some_and(|(kind, subtype)| is_token(kind) && is_token(subtype))
}

/// Voice turn response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChatResponse {
    pub bot_response: String,
    pub audio_content: String,
}

/// Answer a journal entry and speak the reply
async fn voice_chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<VoiceChatResponse>, ApiError> {
    let Json(request) = payload?;
    let reply = state.journal.voice_turn(&request.into()).await?;

    Ok(Json(VoiceChatResponse {
        bot_response: reply.chat.reply,
        audio_content: reply.audio.content,
    }))
}
