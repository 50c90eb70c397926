//! Dev run: generate the change set, record diffs, apply, synchronize.
//!
//! Stages are strictly sequential; each consumes the previous stage's
//! on-disk output. Callers must serialize dev runs per ticket.

use anyhow::Result;

use crate::agent;
use crate::changeset;
use crate::context::AppContext;
use crate::error::Error;
use crate::plan::PLAN_FILE;
use crate::process::{emit, OutputSink};
use crate::vcs::{SyncOutcome, VcsSynchronizer};

pub async fn run_dev(ctx: &AppContext, ticket_id: &str, out: &OutputSink) -> Result<()> {
    let workspace = agent::ensure_workspace(ctx, ticket_id)?;
    if !workspace.join(PLAN_FILE).exists() {
        return Err(Error::PlanNotFound(ticket_id.to_string()).into());
    }

    let change_set = changeset::generate_changes(ctx, ticket_id, out).await?;

    let recorded = changeset::record_diffs(&workspace, &change_set.targets)?;
    emit(out, format!("Recorded {recorded} diff(s)."));

    let applied = changeset::apply_changes(&workspace, &change_set.targets)?;
    emit(
        out,
        format!("Applied {applied} of {} staged file(s).", change_set.generated),
    );

    let sync = VcsSynchronizer::new(&workspace, &ctx.config.base_branch);
    match sync.sync(ticket_id, out).await? {
        SyncOutcome::Synced { pr_url, pr_created } => {
            let verb = if pr_created { "created" } else { "updated" };
            emit(out, format!("Dev run complete; pull request {verb}: {pr_url}"));
        }
        SyncOutcome::LocalOnly => {
            emit(out, "Dev run complete; changes committed locally.");
        }
    }
    Ok(())
}
