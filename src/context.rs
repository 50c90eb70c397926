//! Process-lifetime application context injected into every stage.

use std::sync::Arc;

use crate::config::Config;
use crate::history::{ConversationStore, NoConversation};
use crate::session::SessionRegistry;

/// Shared services owned for the process lifetime.
///
/// Constructed once in `main` and passed by reference, never reached
/// through a global. Tests build their own with isolated registries.
pub struct AppContext {
    pub config: Config,
    pub sessions: SessionRegistry,
    pub history: Arc<dyn ConversationStore>,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        Self::with_history(config, Arc::new(NoConversation))
    }

    /// Wire in a real persistence backend for conversation context.
    pub fn with_history(config: Config, history: Arc<dyn ConversationStore>) -> Self {
        Self {
            config,
            sessions: SessionRegistry::new(),
            history,
        }
    }
}
