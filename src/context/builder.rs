//! Context assembler for building the turn sequence sent to the model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::{ConversationRepo, Message, MessageRepo, MessageRole};
use crate::prompt::build_system_prompt;
use crate::{Error, Result};

/// Suffix for history drawn from the conversation being answered
pub const CURRENT_CONVERSATION_MARKER: &str = " (current conversation)";

/// Suffix for history drawn from the user's other conversations
pub const PREVIOUS_CONVERSATION_MARKER: &str = " (from previous conversation)";

/// Which conversations feed the prompt history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryScope {
    /// Every conversation owned by the user, annotated by origin
    #[default]
    AllConversations,
    /// Only the conversation being answered, verbatim
    CurrentOnly,
}

impl MemoryScope {
    /// Configuration representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllConversations => "all-conversations",
            Self::CurrentOnly => "current-only",
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all-conversations" | "all" => Ok(Self::AllConversations),
            "current-only" | "current" => Ok(Self::CurrentOnly),
            other => Err(Error::Config(format!(
                "unknown context scope '{other}' (expected all-conversations or current-only)"
            ))),
        }
    }
}

/// Role of a prompt turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for TurnRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => Self::User,
            MessageRole::Assistant => Self::Assistant,
        }
    }
}

/// One role-tagged unit of text sent to the model
///
/// Serializes as `{"role": ..., "content": ...}`, the chat-completions message shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTurn {
    pub role: TurnRole,
    pub content: String,
}

impl PromptTurn {
    /// System instruction turn
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    /// User turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }
}

/// Configuration for context assembly
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Maximum number of historical messages included in a prompt (N)
    pub max_history: usize,
    /// Conversations that feed the history
    pub scope: MemoryScope,
    /// System instruction placed first in every prompt
    pub system_prompt: String,
}

impl ContextConfig {
    /// Configuration for a scope, using the built-in system instruction
    #[must_use]
    pub fn for_scope(scope: MemoryScope, max_history: usize) -> Self {
        Self {
            max_history,
            scope,
            system_prompt: build_system_prompt(scope, None),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::for_scope(MemoryScope::default(), 20)
    }
}

/// Builds the prompt for a journaling turn
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    /// Create a new context assembler
    #[must_use]
    pub const fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Assemble the turn sequence for a new utterance in `conversation_id`
    ///
    /// `exclude_message_id` keeps an already-persisted copy of the utterance out
    /// of the history so it appears only once, as the final turn.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if `user_id` does not own the conversation, or a
    /// store error if history cannot be read
    pub fn assemble(
        &self,
        user_id: &str,
        conversation_id: &str,
        user_input: &str,
        exclude_message_id: Option<&str>,
        conversations: &ConversationRepo,
        messages: &MessageRepo,
    ) -> Result<Vec<PromptTurn>> {
        conversations.get_owned(conversation_id, user_id)?;

        let history = match self.config.scope {
            MemoryScope::AllConversations => {
                messages.recent_for_user(user_id, self.config.max_history, exclude_message_id)?
            }
            MemoryScope::CurrentOnly => messages.recent_in_conversation(
                conversation_id,
                self.config.max_history,
                exclude_message_id,
            )?,
        };

        tracing::debug!(
            conversation_id,
            scope = %self.config.scope,
            history = history.len(),
            "assembled prompt context"
        );

        Ok(assemble_turns(
            &history,
            conversation_id,
            &self.config,
            user_input,
        ))
    }
}

/// Arrange history into prompt turns
///
/// History must already be oldest-first. Output is the system instruction, then
/// at most `max_history` of the newest history turns (annotated by origin when
/// the scope spans conversations), then `user_input` verbatim.
#[must_use]
pub fn assemble_turns(
    history: &[Message],
    current_conversation_id: &str,
    config: &ContextConfig,
    user_input: &str,
) -> Vec<PromptTurn> {
    let start = history.len().saturating_sub(config.max_history);
    let history = &history[start..];

    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(PromptTurn::system(config.system_prompt.clone()));

    turns.extend(history.iter().map(|msg| {
        let content = match config.scope {
            MemoryScope::AllConversations => {
                let marker = if msg.conversation_id == current_conversation_id {
                    CURRENT_CONVERSATION_MARKER
                } else {
                    PREVIOUS_CONVERSATION_MARKER
                };
                format!("{}{marker}", msg.content)
            }
            MemoryScope::CurrentOnly => msg.content.clone(),
        };

        PromptTurn {
            role: msg.role.into(),
            content,
        }
    }));

    turns.push(PromptTurn::user(user_input));
    turns
}
