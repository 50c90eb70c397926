//! Plan stage: one agent turn producing the per-ticket plan artifact.

use std::io::Write;

use tracing::{info, warn};

use crate::agent;
use crate::context::AppContext;
use crate::error::Result;
use crate::process::{emit, OutputSink};

/// Plan artifact file name inside a ticket workspace.
pub const PLAN_FILE: &str = "plan.md";

/// Fixed header written before the streamed plan content.
const PLAN_HEADER: &str = "# Implementation Plan\n\n";

/// Generate the plan for a ticket, streaming it into `plan.md` and to the
/// caller at the same time. Returns the final artifact size in bytes.
///
/// Each run fully replaces the previous plan; there is no merge. Output is
/// flushed line by line so an interrupted run leaves a readable partial
/// artifact rather than nothing.
pub async fn make_plan(ctx: &AppContext, ticket_id: &str, out: &OutputSink) -> Result<u64> {
    let workspace = agent::ensure_workspace(ctx, ticket_id)?;
    let context = ctx.history.context_for(ticket_id);

    let prompt = format!(
        "You are the planning agent for this ticket.\n\
         Write a clear, step-by-step implementation plan for ticket {ticket_id} \
         as plain markdown.\n\
         - Respond with the plan content only.\n\
         - Do NOT create, edit, or delete any files in this step.\n\n\
         Prior discussion for context:\n{context}\n"
    );

    let mut stream = agent::invoke(ctx, ticket_id, &prompt).await?;

    let plan_path = workspace.join(PLAN_FILE);
    let mut file = std::fs::File::create(&plan_path)?;
    file.write_all(PLAN_HEADER.as_bytes())?;
    file.flush()?;

    while let Some(line) = stream.next_line().await {
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        emit(out, line);
    }

    let status = stream.wait().await?;
    if !status.success() {
        warn!("plan agent run exited with {}", status);
    }

    let bytes = file.metadata()?.len();
    info!("plan for ticket {} written ({} bytes)", ticket_id, bytes);
    emit(out, format!("Plan written to {PLAN_FILE} ({bytes} bytes)."));
    Ok(bytes)
}
