//! One generative-agent invocation bound to a ticket's workspace and
//! session.
//!
//! Invocation shape: `<agent> -p "<prompt>" --resume=<session_token>`.
//! The session token keeps the agent's context accumulating across the
//! chat, plan, and dev stages of a ticket.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::process::{emit, stream_command, LineStream, OutputSink};

/// Resolve and validate the workspace directory for a ticket.
pub fn ensure_workspace(ctx: &AppContext, ticket_id: &str) -> Result<PathBuf> {
    let path = ctx.config.workspace_for(ticket_id);
    if !path.is_dir() {
        return Err(Error::WorkspaceNotFound {
            ticket_id: ticket_id.to_string(),
            path,
        });
    }
    Ok(path)
}

/// Run one agent turn in the ticket's workspace, resuming the ticket's
/// session. Returns the sanitized line stream; the caller drains it and
/// may then await process exit.
pub async fn invoke(ctx: &AppContext, ticket_id: &str, prompt: &str) -> Result<LineStream> {
    let workspace = ensure_workspace(ctx, ticket_id)?;
    let token = ctx
        .sessions
        .get_or_create(&ctx.config.agent_bin, ticket_id, &workspace)
        .await?;

    let resume = format!("--resume={token}");
    debug!("invoking agent for ticket {}", ticket_id);
    stream_command(&ctx.config.agent_bin, &["-p", prompt, &resume], &workspace)
}

/// Drain an agent stream, forwarding every line to the caller while
/// accumulating it for parsing. Returns the accumulated lines.
pub async fn collect_forwarding(mut stream: LineStream, out: &OutputSink) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    while let Some(line) = stream.next_line().await {
        emit(out, line.clone());
        lines.push(line);
    }
    let status = stream.wait().await?;
    if !status.success() {
        warn!("agent process exited with {}", status);
    }
    Ok(lines)
}
