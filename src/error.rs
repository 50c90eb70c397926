//! Error taxonomy for the ticket pipeline.
//!
//! Stage-local failures that affect a single file are absorbed where they
//! happen and reported in-band through the output stream; everything here
//! invalidates the rest of a run and aborts it. Nothing is retried.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The ticket has no bootstrapped workspace directory.
    #[error("workspace for ticket '{ticket_id}' not found at {}", path.display())]
    WorkspaceNotFound { ticket_id: String, path: PathBuf },

    /// The dev stage was invoked before a plan artifact exists.
    #[error("plan.md not found for ticket '{0}'; run the plan stage first")]
    PlanNotFound(String),

    /// No session token could be recovered from the agent's session listing.
    #[error("could not resolve an agent session for ticket '{ticket_id}': {detail}")]
    SessionLookup { ticket_id: String, detail: String },

    /// The target-file listing was not a valid JSON array of paths.
    #[error("target file list is not a JSON array of paths: {0}")]
    TargetParse(String),

    /// A git or gh invocation failed; `detail` is the tool's own diagnostic.
    #[error("{op} failed: {detail}")]
    Vcs { op: &'static str, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
