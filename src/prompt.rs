//! System instruction for the journaling assistant

use crate::context::MemoryScope;

/// Persona shared by every scope
const PERSONA: &str = "You are a helpful AI journaling assistant. \
Help users reflect on their thoughts and feelings.";

/// Appended when history spans all of the user's conversations
const CROSS_CONVERSATION_GUIDANCE: &str = "Use context from all previous conversations to \
provide highly personalized and relevant responses. Messages are marked as coming from the \
current conversation or a previous one. When referencing previous conversations, be natural \
and conversational.";

/// Appended when history is limited to the current conversation
const SINGLE_CONVERSATION_GUIDANCE: &str =
    "Use the earlier messages of this conversation to keep your replies personal and relevant.";

const STYLE: &str = "Keep responses concise but meaningful.";

/// Build the system instruction for a memory scope
///
/// A non-empty `persona_override` replaces the built-in persona sentence while
/// keeping the scope guidance, so the model can still read the history markers.
#[must_use]
pub fn build_system_prompt(scope: MemoryScope, persona_override: Option<&str>) -> String {
    let persona = persona_override
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(PERSONA);

    let guidance = match scope {
        MemoryScope::AllConversations => CROSS_CONVERSATION_GUIDANCE,
        MemoryScope::CurrentOnly => SINGLE_CONVERSATION_GUIDANCE,
    };

    format!("{persona} {guidance} {STYLE}")
}
