//! Configuration management for the journal gateway
//!
//! Every setting resolves as environment variable, then config file, then default.

pub mod file;

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use crate::context::{ContextConfig, MemoryScope};
use crate::llm::CompletionParams;
use crate::prompt::build_system_prompt;
use crate::voice::{DEFAULT_STT_MODEL, SpeechParams};
use crate::{Error, Result};

use self::file::JournalConfigFile;

/// Default `OpenAI`-compatible API root
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8787;

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "journal.db";

/// Journal gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Path to data directory (database)
    pub data_dir: PathBuf,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Completion/speech provider connection
    pub openai: OpenAiConfig,

    /// Completion sampling parameters
    pub completion: CompletionParams,

    /// Prompt context assembly
    pub context: ContextConfig,

    /// Speech synthesis parameters
    pub speech: SpeechParams,

    /// Transcription model
    pub stt_model: String,
}

/// HTTP API server configuration
#[derive(Debug)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Bearer key required on function routes (from `JOURNAL_API_KEY` env)
    pub api_key: Option<SecretString>,

    /// Global request budget per minute; `None` disables rate limiting
    pub rate_limit_per_minute: Option<u32>,
}

/// Provider connection settings
#[derive(Debug)]
pub struct OpenAiConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
}

impl OpenAiConfig {
    /// API key, required for every provider call
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured
    pub fn require_api_key(&self) -> Result<SecretString> {
        self.api_key
            .as_ref()
            .map(|key| SecretString::from(key.expose_secret().to_owned()))
            .ok_or_else(|| {
                Error::Config(
                    "OPENAI_API_KEY is not set (env or [api_keys] openai in config file)"
                        .to_string(),
                )
            })
    }
}

impl Config {
    /// Load configuration from the process environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn load() -> Result<Self> {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed config file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn resolve<F>(fc: JournalConfigFile, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank variables count as unset
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Data directory (~/.local/share/journal-gateway on Linux)
        let data_dir = env("JOURNAL_DATA_DIR")
            .or(fc.server.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        // PORT is only consulted when JOURNAL_PORT is unset
        let env_port = match parse_env(&env, "JOURNAL_PORT")? {
            Some(port) => Some(port),
            None => parse_env(&env, "PORT")?,
        };
        let api_server = ApiServerConfig {
            port: env_port.or(fc.server.port).unwrap_or(DEFAULT_PORT),
            api_key: env("JOURNAL_API_KEY")
                .or(fc.api_keys.gateway)
                .map(SecretString::from),
            rate_limit_per_minute: parse_env(&env, "JOURNAL_RATE_LIMIT_PER_MINUTE")?
                .or(fc.server.rate_limit_per_minute)
                .filter(|n| *n > 0),
        };

        let openai = OpenAiConfig {
            api_key: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            base_url: env("JOURNAL_OPENAI_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        };

        let defaults = CompletionParams::default();
        let completion = CompletionParams {
            model: env("JOURNAL_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(defaults.model),
            max_tokens: parse_env(&env, "JOURNAL_LLM_MAX_TOKENS")?
                .or(fc.llm.max_tokens)
                .unwrap_or(defaults.max_tokens),
            temperature: parse_env(&env, "JOURNAL_LLM_TEMPERATURE")?
                .or(fc.llm.temperature)
                .unwrap_or(defaults.temperature),
            presence_penalty: parse_env(&env, "JOURNAL_LLM_PRESENCE_PENALTY")?
                .or(fc.llm.presence_penalty)
                .unwrap_or(defaults.presence_penalty),
            frequency_penalty: parse_env(&env, "JOURNAL_LLM_FREQUENCY_PENALTY")?
                .or(fc.llm.frequency_penalty)
                .unwrap_or(defaults.frequency_penalty),
        }
        .bounded();

        let scope = match env("JOURNAL_CONTEXT_SCOPE").or(fc.context.scope) {
            Some(raw) => raw.parse::<MemoryScope>()?,
            None => MemoryScope::default(),
        };
        let max_history = parse_env(&env, "JOURNAL_CONTEXT_MAX_HISTORY")?
            .or(fc.context.max_history)
            .unwrap_or_else(|| ContextConfig::default().max_history);
        let persona = env("JOURNAL_PERSONA").or(fc.context.persona);
        let context = ContextConfig {
            max_history,
            scope,
            system_prompt: build_system_prompt(scope, persona.as_deref()),
        };

        let speech_defaults = SpeechParams::default();
        let speech = SpeechParams {
            model: env("JOURNAL_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(speech_defaults.model),
            voice: env("JOURNAL_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(speech_defaults.voice),
            format: match env("JOURNAL_TTS_FORMAT").or(fc.voice.tts_format) {
                Some(raw) => raw.parse()?,
                None => speech_defaults.format,
            },
            speed: parse_env(&env, "JOURNAL_TTS_SPEED")?
                .or(fc.voice.tts_speed)
                .unwrap_or(speech_defaults.speed),
            max_input_chars: parse_env(&env, "JOURNAL_TTS_MAX_CHARS")?
                .or(fc.voice.tts_max_chars)
                .unwrap_or(speech_defaults.max_input_chars),
        }
        .bounded();

        let stt_model = env("JOURNAL_STT_MODEL")
            .or(fc.voice.stt_model)
            .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string());

        Ok(Self {
            data_dir,
            api_server,
            openai,
            completion,
            context,
            speech,
            stt_model,
        })
    }

    /// Path of the `SQLite` database
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

/// Parse an environment variable, rejecting values that do not parse
fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
        })
        .transpose()
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/journal-gateway"),
        |d| d.data_dir().join("journal-gateway"),
    )
}
