//! Journal Gateway - backend for a voice and text journaling assistant
//!
//! This library provides the core functionality for the journal gateway:
//! - Conversation and message persistence
//! - Prompt context assembly across a user's journal history
//! - LLM replies through an `OpenAI`-compatible completion endpoint
//! - Speech synthesis and transcription
//! - HTTP function routes for browser clients
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Browser client                      │
//! │      type or record  │  play reply audio            │
//! └────────────────────┬────────────────────────────────┘
//!                      │  /functions/v1/*
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Journal Gateway                      │
//! │  Store  │  Context  │  Completion  │  Speech/Codec  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │          OpenAI-compatible provider                  │
//! │   chat/completions  │  audio/speech  │  whisper     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod codec;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod journal;
pub mod llm;
pub mod prompt;
pub mod voice;

pub use config::Config;
pub use context::{ContextAssembler, ContextConfig, MemoryScope, PromptTurn};
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use journal::{ChatReply, ChatTurn, EncodedAudio, JournalService, VoiceReply};
pub use llm::{CompletionParams, CompletionProvider, OpenAiCompletion};
pub use voice::{
    AudioFormat, OpenAiSpeech, SpeechOverrides, SpeechParams, SpeechProvider, SpeechToText,
    Transcriber,
};
