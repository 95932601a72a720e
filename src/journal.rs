//! Journaling turn pipeline
//!
//! One request runs strictly in sequence: persist the user message, assemble
//! context, complete, persist the assistant message, synthesize, encode. Any
//! failure aborts the remaining stages. Side effects already committed stay
//! committed; there is no rollback and no retry.

use std::sync::Arc;

use crate::codec;
use crate::context::ContextAssembler;
use crate::db::{ConversationRepo, DbPool, Message, MessageRepo, MessageRole};
use crate::llm::{CompletionParams, CompletionProvider};
use crate::voice::{SpeechOverrides, SpeechParams, SpeechProvider, truncate_input};
use crate::{Error, Result};

/// A new utterance submitted to a conversation
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user_id: String,
    pub conversation_id: String,
    pub user_input: String,
}

impl ChatTurn {
    fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidInput("userId is required".to_string()));
        }
        if self.conversation_id.trim().is_empty() {
            return Err(Error::InvalidInput("chatId is required".to_string()));
        }
        if self.user_input.trim().is_empty() {
            return Err(Error::InvalidInput("userInput is required".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a successful chat turn
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// Assistant reply text, exactly as returned by the provider
    pub reply: String,
    pub user_message: Message,
    pub assistant_message: Message,
}

/// Synthesized audio ready to cross the transport boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    /// Standard base64 of the provider's raw audio bytes
    pub content: String,
    pub mime_type: &'static str,
    /// Size of the audio before encoding
    pub byte_len: usize,
}

/// Outcome of a full voice turn
#[derive(Debug, Clone)]
pub struct VoiceReply {
    pub chat: ChatReply,
    pub audio: EncodedAudio,
}

/// Runs journaling turns against the store and the providers
pub struct JournalService {
    conversations: ConversationRepo,
    messages: MessageRepo,
    assembler: ContextAssembler,
    completion: Arc<dyn CompletionProvider>,
    speech: Arc<dyn SpeechProvider>,
    completion_params: CompletionParams,
    speech_params: SpeechParams,
}

impl JournalService {
    /// Create a service with default completion and speech parameters
    #[must_use]
    pub fn new(
        pool: DbPool,
        assembler: ContextAssembler,
        completion: Arc<dyn CompletionProvider>,
        speech: Arc<dyn SpeechProvider>,
    ) -> Self {
        Self {
            conversations: ConversationRepo::new(pool.clone()),
            messages: MessageRepo::new(pool),
            assembler,
            completion,
            speech,
            completion_params: CompletionParams::default(),
            speech_params: SpeechParams::default(),
        }
    }

    /// Set completion parameters (clamped to provider ranges)
    #[must_use]
    pub fn with_completion_params(mut self, params: CompletionParams) -> Self {
        self.completion_params = params.bounded();
        self
    }

    /// Set speech parameters (clamped to provider ranges)
    #[must_use]
    pub fn with_speech_params(mut self, params: SpeechParams) -> Self {
        self.speech_params = params.bounded();
        self
    }

    #[must_use]
    pub const fn conversations(&self) -> &ConversationRepo {
        &self.conversations
    }

    #[must_use]
    pub const fn messages(&self) -> &MessageRepo {
        &self.messages
    }

    #[must_use]
    pub const fn speech_params(&self) -> &SpeechParams {
        &self.speech_params
    }

    /// Answer a new utterance and persist both sides of the exchange
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank fields, `Unauthorized` if the user does
    /// not own the conversation (nothing is stored and no provider is called),
    /// `CompletionFailed` if the provider fails (the user message stays stored),
    /// or a store error
    pub async fn chat(&self, turn: &ChatTurn) -> Result<ChatReply> {
        turn.validate()?;
        self.conversations
            .get_owned(&turn.conversation_id, &turn.user_id)?;

        let user_message =
            self.messages
                .insert(&turn.conversation_id, MessageRole::User, &turn.user_input)?;

        let prompt = self.assembler.assemble(
            &turn.user_id,
            &turn.conversation_id,
            &turn.user_input,
            Some(&user_message.id),
            &self.conversations,
            &self.messages,
        )?;

        tracing::info!(
            conversation_id = %turn.conversation_id,
            provider = self.completion.name(),
            turns = prompt.len(),
            "completing journal turn"
        );

        let reply = self
            .completion
            .complete(&prompt, &self.completion_params)
            .await?;

        let assistant_message =
            self.messages
                .insert(&turn.conversation_id, MessageRole::Assistant, &reply)?;

        Ok(ChatReply {
            reply,
            user_message,
            assistant_message,
        })
    }

    /// Synthesize `text` and encode the audio for transport
    ///
    /// Text over the configured limit is truncated with an ellipsis first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank text or `SpeechSynthesisFailed` if the
    /// provider fails
    pub async fn speak(&self, text: &str, overrides: &SpeechOverrides) -> Result<EncodedAudio> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("text is required".to_string()));
        }

        let params = self.speech_params.with_overrides(overrides);
        let input = truncate_input(text, params.max_input_chars);
        if input.len() != text.len() {
            tracing::debug!(
                limit = params.max_input_chars,
                "truncated speech input"
            );
        }

        let audio = self.speech.synthesize(&input, &params).await?;
        if audio.is_empty() {
            return Err(Error::SpeechSynthesisFailed {
                status: None,
                message: "provider returned no audio".to_string(),
            });
        }

        Ok(EncodedAudio {
            content: codec::encode_chunked(&audio)?,
            mime_type: params.mime_type(),
            byte_len: audio.len(),
        })
    }

    /// Run a chat turn and speak the reply
    ///
    /// If synthesis fails the error is returned even though both messages are
    /// already stored.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::chat`] or [`Self::speak`]
    pub async fn voice_turn(&self, turn: &ChatTurn) -> Result<VoiceReply> {
        let chat = self.chat(turn).await?;
        let audio = self
            .speak(&chat.reply, &SpeechOverrides::default())
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    conversation_id = %turn.conversation_id,
                    error = %e,
                    "reply stored but speech failed"
                );
            })?;

        Ok(VoiceReply { chat, audio })
    }
}
