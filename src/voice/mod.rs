//! Speech gateway
//!
//! Turns reply text into audio through an `OpenAI`-compatible speech endpoint,
//! and transcribes recorded audio back into text.

mod stt;
mod tts;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use stt::{DEFAULT_STT_MODEL, SpeechToText};
pub use tts::OpenAiSpeech;

/// Default speech model
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// Default voice
pub const DEFAULT_VOICE: &str = "alloy";

/// Default playback speed (slightly faster than natural)
pub const DEFAULT_SPEED: f32 = 1.2;

/// Provider-imposed input limit, in characters
pub const DEFAULT_MAX_INPUT_CHARS: usize = 4096;

/// Marker appended to truncated input
pub const ELLIPSIS: &str = "...";

const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

/// Audio container returned by the speech provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl AudioFormat {
    /// Provider `response_format` value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }

    /// Content type for data URLs built by clients
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/ogg",
            Self::Aac => "audio/aac",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::Pcm => "audio/pcm",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "opus" => Ok(Self::Opus),
            "aac" => Ok(Self::Aac),
            "flac" => Ok(Self::Flac),
            "wav" => Ok(Self::Wav),
            "pcm" => Ok(Self::Pcm),
            other => Err(Error::Config(format!("unknown audio format '{other}'"))),
        }
    }
}

/// Synthesis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechParams {
    pub model: String,
    pub voice: String,
    pub format: AudioFormat,
    /// Playback speed multiplier
    pub speed: f32,
    /// Longer input is truncated before submission
    pub max_input_chars: usize,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            format: AudioFormat::default(),
            speed: DEFAULT_SPEED,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

impl SpeechParams {
    /// Clamp speed into the provider range and keep room for the ellipsis
    #[must_use]
    pub fn bounded(mut self) -> Self {
        self.speed = if self.speed.is_finite() {
            self.speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            DEFAULT_SPEED
        };
        self.max_input_chars = self.max_input_chars.max(ELLIPSIS.len() + 1);
        self
    }

    /// Apply per-request overrides; blank strings keep the configured value
    #[must_use]
    pub fn with_overrides(&self, overrides: &SpeechOverrides) -> Self {
        let pick = |value: &Option<String>, fallback: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        Self {
            model: pick(&overrides.model, &self.model),
            voice: pick(&overrides.voice, &self.voice),
            format: self.format,
            speed: overrides.speed.unwrap_or(self.speed),
            max_input_chars: self.max_input_chars,
        }
        .bounded()
    }

    /// Content type of the synthesized audio
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Per-request speech settings supplied by the client
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SpeechOverrides {
    pub speed: Option<f32>,
    pub model: Option<String>,
    pub voice: Option<String>,
}

/// Cut `text` to at most `max_chars` characters, marking the cut with an ellipsis
///
/// Counts Unicode scalar values and never splits one. The ellipsis fits inside
/// the limit so the provider never sees more than `max_chars`.
#[must_use]
pub fn truncate_input(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// A text-to-speech backend
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize `text`, returning the raw audio bytes
    ///
    /// # Errors
    ///
    /// Returns `SpeechSynthesisFailed` if the provider rejects the request or
    /// returns no audio
    async fn synthesize(&self, text: &str, params: &SpeechParams) -> Result<Vec<u8>>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// A speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a recording; `mime` is its content type (browsers record `audio/webm`)
    ///
    /// # Errors
    ///
    /// Returns `TranscriptionFailed` if the provider fails or hears no speech
    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<String>;
}
