//! Prompt context assembly for journaling conversations
//!
//! Combines:
//! - The journaling-assistant system instruction
//! - Recent message history (current conversation or all of the user's)
//! - The new user utterance

mod builder;

pub use builder::{
    CURRENT_CONVERSATION_MARKER, ContextAssembler, ContextConfig, MemoryScope,
    PREVIOUS_CONVERSATION_MARKER, PromptTurn, TurnRole, assemble_turns,
};
