//! Interface to the conversation-history collaborator.
//!
//! Message persistence lives outside this crate. The pipeline only needs
//! the read path: prior discussion for a ticket, formatted for inclusion
//! in an agent prompt.

/// Read access to a ticket's prior conversation.
pub trait ConversationStore: Send + Sync {
    /// Formatted conversation context for a ticket, ready to embed in a
    /// prompt. Implementations decide truncation and formatting.
    fn context_for(&self, ticket_id: &str) -> String;
}

/// Store used when no persistence backend is wired up.
pub struct NoConversation;

impl ConversationStore for NoConversation {
    fn context_for(&self, _ticket_id: &str) -> String {
        "No previous conversation.".to_string()
    }
}
