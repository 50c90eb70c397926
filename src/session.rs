//! Per-ticket session continuity with the generative agent.
//!
//! The agent accumulates context inside named sessions. This module keeps
//! exactly one live session per ticket: created lazily by issuing a
//! throwaway prompt in the ticket workspace, then recovered from the
//! agent's session listing. Tokens live only for the process lifetime;
//! a restart silently starts fresh sessions.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::process::run_captured;

/// Pattern the agent uses to print session tokens in its listing, e.g.
/// `5. session_test (Just now) [5a249b28-9b10-499f-94f3-89cca14dc7c5]`.
const TOKEN_PATTERN: &str = r"\[([0-9a-fA-F-]{36})\]";

/// Process-wide registry mapping ticket ids to agent session tokens.
///
/// An explicit service object rather than module-level state: constructed
/// once at process start and injected into every stage, so tests get
/// isolated registries and durable storage can replace it later. One entry
/// is written per ticket and read-mostly thereafter.
#[derive(Default)]
pub struct SessionRegistry {
    tokens: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached session token for a ticket, creating a fresh
    /// agent session on first use.
    ///
    /// Creation issues an initialization prompt to force the agent to
    /// register a session in this workspace, then parses the most
    /// recently listed token out of the session listing. Every later
    /// invocation for the ticket resumes this token so the agent keeps
    /// accumulating context.
    pub async fn get_or_create(
        &self,
        agent_bin: &str,
        ticket_id: &str,
        workspace: &Path,
    ) -> Result<String> {
        if let Some(token) = self.tokens.read().await.get(ticket_id) {
            return Ok(token.clone());
        }

        let init_prompt =
            format!("Initialize a long-lived development session for ticket {ticket_id}.");
        let init = run_captured(agent_bin, &["-p", &init_prompt], workspace).await?;
        if !init.status.success() {
            debug!("session init prompt exited with {}", init.status);
        }

        let listing = run_captured(agent_bin, &["--list-sessions"], workspace).await?;
        if !listing.status.success() {
            return Err(Error::SessionLookup {
                ticket_id: ticket_id.to_string(),
                detail: format!("session listing failed: {}", listing.stderr.trim()),
            });
        }

        let token =
            parse_latest_token(&listing.combined()).ok_or_else(|| Error::SessionLookup {
                ticket_id: ticket_id.to_string(),
                detail: "no session token found in listing output".to_string(),
            })?;

        info!("created agent session {} for ticket {}", token, ticket_id);
        self.tokens
            .write()
            .await
            .insert(ticket_id.to_string(), token.clone());
        Ok(token)
    }
}

/// Parse the last `[<36 hex-and-dash chars>]` occurrence that is a valid
/// UUID. The listing prints sessions oldest-first, so the last token is
/// the session just created.
fn parse_latest_token(output: &str) -> Option<String> {
    let pattern = Regex::new(TOKEN_PATTERN).expect("token pattern is valid");
    pattern
        .captures_iter(output)
        .filter_map(|caps| {
            let candidate = caps.get(1)?.as_str();
            Uuid::try_parse(candidate).ok().map(|_| candidate.to_string())
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_latest_token_last_wins() {
        let output = "\
  1. old (2 days ago) [11111111-2222-3333-4444-555555555555]\n\
  2. new (Just now) [5a249b28-9b10-499f-94f3-89cca14dc7c5]\n";
        assert_eq!(
            parse_latest_token(output).as_deref(),
            Some("5a249b28-9b10-499f-94f3-89cca14dc7c5")
        );
    }

    #[test]
    fn test_parse_latest_token_skips_invalid_uuids() {
        // 36 hex-and-dash chars that are not a well-formed UUID
        let output = "\
  1. real (1 hour ago) [5a249b28-9b10-499f-94f3-89cca14dc7c5]\n\
  2. junk (Just now) [------------------------------------]\n";
        assert_eq!(
            parse_latest_token(output).as_deref(),
            Some("5a249b28-9b10-499f-94f3-89cca14dc7c5")
        );
    }

    #[test]
    fn test_parse_latest_token_none() {
        assert_eq!(parse_latest_token("no sessions yet"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let workspace = tmp.path().join("ws");
        fs::create_dir(&workspace).unwrap();

        let calls = tmp.path().join("calls.log");
        let agent = tmp.path().join("fake-agent");
        let script = format!(
            "#!/bin/sh\n\
             echo \"$1\" >> {log}\n\
             if [ \"$1\" = \"--list-sessions\" ]; then\n\
               echo '  1. dev (Just now) [5a249b28-9b10-499f-94f3-89cca14dc7c5]'\n\
             fi\n",
            log = calls.display()
        );
        fs::write(&agent, script).unwrap();
        fs::set_permissions(&agent, fs::Permissions::from_mode(0o755)).unwrap();

        let registry = SessionRegistry::new();
        let bin = agent.to_str().unwrap();

        let first = registry
            .get_or_create(bin, "COD-28", &workspace)
            .await
            .unwrap();
        let second = registry
            .get_or_create(bin, "COD-28", &workspace)
            .await
            .unwrap();

        assert_eq!(first, "5a249b28-9b10-499f-94f3-89cca14dc7c5");
        assert_eq!(first, second);

        // Only the first call runs the bootstrap + listing invocations.
        let log = fs::read_to_string(&calls).unwrap();
        let listings = log.lines().filter(|l| *l == "--list-sessions").count();
        assert_eq!(listings, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_get_or_create_fails_without_token() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let workspace = tmp.path().join("ws");
        fs::create_dir(&workspace).unwrap();

        let agent = tmp.path().join("fake-agent");
        fs::write(&agent, "#!/bin/sh\necho 'no sessions'\n").unwrap();
        fs::set_permissions(&agent, fs::Permissions::from_mode(0o755)).unwrap();

        let registry = SessionRegistry::new();
        let err = registry
            .get_or_create(agent.to_str().unwrap(), "COD-28", &workspace)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionLookup { .. }));
    }
}
