//! Runtime configuration resolved from CLI flags and environment variables.

use std::path::PathBuf;

/// Agent binary used when neither flag nor environment variable is set.
pub const DEFAULT_AGENT_BIN: &str = "gemini";

/// Base branch pull requests target by default.
pub const DEFAULT_BASE_BRANCH: &str = "main";

#[derive(Debug, Clone)]
pub struct Config {
    /// Generative agent CLI binary.
    pub agent_bin: String,
    /// Root directory holding one workspace per ticket.
    pub tickets_root: PathBuf,
    /// Base branch that pull requests target.
    pub base_branch: String,
}

impl Config {
    pub fn new(
        agent_bin: Option<String>,
        tickets_root: Option<PathBuf>,
        base_branch: Option<String>,
    ) -> Self {
        Self {
            agent_bin: agent_bin.unwrap_or_else(|| DEFAULT_AGENT_BIN.to_string()),
            tickets_root: tickets_root.unwrap_or_else(default_tickets_root),
            base_branch: base_branch.unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string()),
        }
    }

    /// Workspace directory for a ticket. Existence is validated by callers;
    /// workspaces are bootstrapped by an external collaborator and never
    /// created or deleted here.
    pub fn workspace_for(&self, ticket_id: &str) -> PathBuf {
        self.tickets_root.join(ticket_id)
    }
}

/// `~/.ticketpilot/tickets`, falling back to `./tickets` when the home
/// directory cannot be determined.
pub fn default_tickets_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ticketpilot").join("tickets"))
        .unwrap_or_else(|| PathBuf::from("tickets"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = Config::new(None, Some(PathBuf::from("/tmp/tickets")), None);
        assert_eq!(config.agent_bin, DEFAULT_AGENT_BIN);
        assert_eq!(config.base_branch, DEFAULT_BASE_BRANCH);
        assert_eq!(
            config.workspace_for("COD-28"),
            PathBuf::from("/tmp/tickets/COD-28")
        );
    }
}
