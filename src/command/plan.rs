use anyhow::Result;

use crate::context::AppContext;
use crate::plan;
use crate::process::OutputSink;

pub async fn run_plan(ctx: &AppContext, ticket_id: &str, out: &OutputSink) -> Result<()> {
    plan::make_plan(ctx, ticket_id, out).await?;
    Ok(())
}
