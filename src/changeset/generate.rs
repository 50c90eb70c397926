//! Target enumeration and per-file regeneration (phases A and B).
//!
//! Both phases run against the ticket's one session, so the agent carries
//! the plan context from the plan stage into file generation.

use std::fs;
use std::path::{Component, Path};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::agent;
use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::plan::PLAN_FILE;
use crate::process::{emit, OutputSink};

use super::staged_path;

/// Audit artifact recording the target file list for a run.
pub const MANIFEST_FILE: &str = "changed_files.json";

/// Outcome of one change-set generation run.
#[derive(Debug)]
pub struct ChangeSet {
    /// Ordered target paths, exactly as enumerated by the agent.
    pub targets: Vec<String>,
    /// Number of files whose staged content was written.
    pub generated: usize,
}

#[derive(Serialize)]
struct Manifest<'a> {
    generated_at: String,
    files: &'a [String],
}

/// Enumerate target files from the plan, then regenerate each file's
/// complete content into its staged counterpart.
///
/// A malformed target listing aborts the run; a single file failing to
/// regenerate is reported and skipped. The manifest is written even when
/// the target list is empty so every run leaves a record of intent.
pub async fn generate_changes(
    ctx: &AppContext,
    ticket_id: &str,
    out: &OutputSink,
) -> Result<ChangeSet> {
    let workspace = agent::ensure_workspace(ctx, ticket_id)?;

    let targets = enumerate_targets(ctx, ticket_id, out).await?;
    write_manifest(&workspace, &targets)?;
    emit(out, format!("{} target file(s) to generate.", targets.len()));

    let mut generated = 0;
    for target in &targets {
        if !is_safe_relative(target) {
            warn!("skipping unsafe target path {:?}", target);
            emit(out, format!("Skipping unsafe path '{target}'."));
            continue;
        }
        match regenerate_file(ctx, ticket_id, &workspace, target, out).await {
            Ok(true) => {
                generated += 1;
                emit(out, format!("Generated {target} ({generated}/{}).", targets.len()));
            }
            Ok(false) => {
                emit(out, format!("Agent produced no content for '{target}', skipped."));
            }
            Err(err) => {
                warn!("regenerating {} failed: {}", target, err);
                emit(out, format!("Failed to regenerate '{target}': {err}"));
            }
        }
    }

    info!(
        "change-set generation for ticket {}: {}/{} files staged",
        ticket_id,
        generated,
        targets.len()
    );
    emit(out, format!("Staged {generated} of {} target file(s).", targets.len()));
    Ok(ChangeSet { targets, generated })
}

/// Phase A: ask the agent for a JSON array of repository-relative paths.
/// Malformed output is fatal; everything downstream needs this list.
async fn enumerate_targets(
    ctx: &AppContext,
    ticket_id: &str,
    out: &OutputSink,
) -> Result<Vec<String>> {
    let prompt = format!(
        "Based on the implementation plan in {PLAN_FILE}, list every repository \
         file that must be created or modified to implement it.\n\
         Respond with ONLY a JSON array of repository-relative file paths.\n\
         Do NOT include {PLAN_FILE} itself.\n\
         Example: [\"src/app.js\", \"src/styles.css\"]"
    );

    let stream = agent::invoke(ctx, ticket_id, &prompt).await?;
    let lines = agent::collect_forwarding(stream, out).await?;
    let joined = lines.join("\n");
    let body = strip_code_fences(&joined);

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| Error::TargetParse(e.to_string()))?;
    let entries = value
        .as_array()
        .ok_or_else(|| Error::TargetParse("expected a JSON array".to_string()))?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::TargetParse(format!("expected string entries, got {entry}")))
        })
        .collect()
}

/// Phase B for one file. Returns `Ok(true)` when staged content was
/// written, `Ok(false)` when the agent produced nothing usable.
async fn regenerate_file(
    ctx: &AppContext,
    ticket_id: &str,
    workspace: &Path,
    target: &str,
    out: &OutputSink,
) -> Result<bool> {
    let existed = workspace.join(target).exists();
    let prompt = if existed {
        format!(
            "Regenerate the file `{target}` so it fully implements the plan in {PLAN_FILE}.\n\
             Respond with the COMPLETE file content and nothing else.\n\
             Never elide content with markers like `... rest of file unchanged ...`; \
             every line of the file must be present."
        )
    } else {
        format!(
            "Create the new file `{target}` required by the plan in {PLAN_FILE}.\n\
             Respond with the COMPLETE file content and nothing else.\n\
             Never elide content with placeholder markers; every line of the \
             file must be present."
        )
    };

    let stream = agent::invoke(ctx, ticket_id, &prompt).await?;
    let lines = agent::collect_forwarding(stream, out).await?;
    let joined = lines.join("\n");
    let content = strip_code_fences(&joined);
    if content.trim().is_empty() {
        return Ok(false);
    }

    let staged = staged_path(workspace, target);
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&staged, content)?;
    Ok(true)
}

/// Record the target list for this run, even when empty.
fn write_manifest(workspace: &Path, targets: &[String]) -> Result<()> {
    let manifest = Manifest {
        generated_at: Utc::now().to_rfc3339(),
        files: targets,
    };
    let json = serde_json::to_string_pretty(&manifest).map_err(std::io::Error::other)?;
    fs::write(workspace.join(MANIFEST_FILE), json)?;
    Ok(())
}

/// Strip a surrounding markdown code fence, with or without a language tag.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed,
    };
    match rest.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim_end(),
        None => rest,
    }
}

/// Reject absolute target paths and any path escaping the workspace root.
pub(crate) fn is_safe_relative(target: &str) -> bool {
    let path = Path::new(target);
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
