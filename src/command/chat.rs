//! Conversational turn inside the ticket's agent session.
//!
//! Chat accumulates context in the same session the plan and dev stages
//! use, so later stages benefit from the discussion. It is not expected
//! to change any files.

use anyhow::{bail, Result};

use crate::agent;
use crate::context::AppContext;
use crate::process::{emit, OutputSink};

const CHAT_PREAMBLE: &str = "You are a helpful coding assistant working inside a collaborative ticket.\n\
    Answer questions about this repository and the ticket context.\n\
    Unless explicitly requested, do NOT modify any files.";

pub async fn run_chat(
    ctx: &AppContext,
    ticket_id: &str,
    message: &str,
    out: &OutputSink,
) -> Result<()> {
    if message.trim().is_empty() {
        bail!("chat requires a non-empty message");
    }

    let prompt = format!("{CHAT_PREAMBLE}\n\nUser message:\n{message}");
    let mut stream = agent::invoke(ctx, ticket_id, &prompt).await?;
    while let Some(line) = stream.next_line().await {
        emit(out, line);
    }
    stream.wait().await?;
    Ok(())
}
