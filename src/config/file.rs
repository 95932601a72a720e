//! TOML configuration file loading
//!
//! Supports `~/.config/journal-gateway/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct JournalConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Completion configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Prompt context configuration
    #[serde(default)]
    pub context: ContextFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory holding the database
    pub data_dir: Option<String>,

    /// Requests allowed per minute across all clients
    pub rate_limit_per_minute: Option<u32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,

    /// Bearer key clients must present on function routes
    pub gateway: Option<String>,
}

/// Completion provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// `OpenAI`-compatible API root (e.g. `https://api.openai.com/v1`)
    pub base_url: Option<String>,

    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

/// Prompt context configuration
#[derive(Debug, Default, Deserialize)]
pub struct ContextFileConfig {
    /// "all-conversations" or "current-only"
    pub scope: Option<String>,

    /// Maximum history messages per prompt
    pub max_history: Option<usize>,

    /// Replacement for the built-in assistant persona sentence
    pub persona: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS output format (e.g. "mp3")
    pub tts_format: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Longest text sent for synthesis, in characters
    pub tts_max_chars: Option<usize>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<JournalConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `JournalConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> JournalConfigFile {
    config_file_path().map_or_else(JournalConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path, falling back to defaults
#[must_use]
pub fn load_config_file_from(path: &Path) -> JournalConfigFile {
    if !path.exists() {
        return JournalConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                JournalConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            JournalConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/journal-gateway/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("journal-gateway").join("config.toml"))
}
