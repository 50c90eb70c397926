//! Version-control synchronization: stage, commit, push, resolve PR.
//!
//! A linear state machine with no loop-back and no retries: staged →
//! committed → pushed → pr-resolved. When the PR tool is missing the run
//! degrades to a local commit, which is success with reduced scope, not a
//! failure. Re-running against a branch with an open pull request reports
//! the existing URL and never creates a duplicate.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::changeset::{COMBINED_DIFF_FILE, DIFF_DIR, MANIFEST_FILE};
use crate::error::{Error, Result};
use crate::process::{emit, run_captured, CapturedOutput, OutputSink};

/// Deterministic working branch for a ticket.
pub fn ticket_branch(ticket_id: &str) -> String {
    format!("ticket_{ticket_id}")
}

/// Outcome of one synchronization run.
#[derive(Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Commits pushed and a pull request resolved for the branch.
    Synced { pr_url: String, pr_created: bool },
    /// Changes committed locally; the PR tool was unavailable.
    LocalOnly,
}

#[derive(Deserialize)]
struct PrView {
    url: String,
}

pub struct VcsSynchronizer<'a> {
    workspace: &'a Path,
    base_branch: String,
    git_bin: String,
    gh_bin: String,
}

impl<'a> VcsSynchronizer<'a> {
    pub fn new(workspace: &'a Path, base_branch: &str) -> Self {
        Self::with_tools(workspace, base_branch, "git", "gh")
    }

    /// Override the VCS tool binaries. Used by tests and unusual installs.
    pub fn with_tools(workspace: &'a Path, base_branch: &str, git_bin: &str, gh_bin: &str) -> Self {
        Self {
            workspace,
            base_branch: base_branch.to_string(),
            git_bin: git_bin.to_string(),
            gh_bin: gh_bin.to_string(),
        }
    }

    /// Run the full synchronization for a ticket's applied changes.
    pub async fn sync(&self, ticket_id: &str, out: &OutputSink) -> Result<SyncOutcome> {
        let branch = ticket_branch(ticket_id);
        let pr_tool = self.pr_tool_available().await;

        self.git("git checkout", &["checkout", "-B", &branch]).await?;
        self.stage_all().await?;
        self.git(
            "git commit",
            &["commit", "-m", "AI-generated implementation"],
        )
        .await?;
        emit(out, "Changes committed.");

        if !pr_tool {
            warn!("PR tool '{}' unavailable; staying local-only", self.gh_bin);
            emit(out, "PR tool not available; changes committed locally only.");
            return Ok(SyncOutcome::LocalOnly);
        }

        self.git(
            "git push",
            &["push", "--set-upstream", "origin", &branch],
        )
        .await?;
        emit(out, format!("Branch '{branch}' pushed to origin."));

        if let Some(url) = self.existing_pr(&branch).await {
            info!("existing PR for {}: {}", branch, url);
            emit(out, format!("Existing PR detected: {url}"));
            emit(out, "PR updated with new commits.");
            return Ok(SyncOutcome::Synced {
                pr_url: url,
                pr_created: false,
            });
        }

        let url = self.create_pr(&branch, ticket_id).await?;
        emit(out, format!("Pull request created: {url}"));
        Ok(SyncOutcome::Synced {
            pr_url: url,
            pr_created: true,
        })
    }

    /// Stage every workspace change except the run's audit artifacts,
    /// which are metadata about the change rather than part of it.
    async fn stage_all(&self) -> Result<()> {
        let exclude_diffs = format!(":(exclude){DIFF_DIR}");
        let exclude_combined = format!(":(exclude){COMBINED_DIFF_FILE}");
        let exclude_manifest = format!(":(exclude){MANIFEST_FILE}");
        self.git(
            "git add",
            &[
                "add",
                "--all",
                "--",
                ".",
                &exclude_diffs,
                &exclude_combined,
                &exclude_manifest,
            ],
        )
        .await?;
        Ok(())
    }

    async fn git(&self, op: &'static str, args: &[&str]) -> Result<CapturedOutput> {
        let output = run_captured(&self.git_bin, args, self.workspace).await?;
        if !output.status.success() {
            return Err(Error::Vcs {
                op,
                detail: output.combined().trim().to_string(),
            });
        }
        Ok(output)
    }

    async fn pr_tool_available(&self) -> bool {
        matches!(
            run_captured(&self.gh_bin, &["--version"], self.workspace).await,
            Ok(output) if output.status.success()
        )
    }

    /// Look up an open pull request for the branch. `None` means either no
    /// PR exists or the lookup could not be completed.
    async fn existing_pr(&self, branch: &str) -> Option<String> {
        let output = run_captured(
            &self.gh_bin,
            &["pr", "view", branch, "--json", "url"],
            self.workspace,
        )
        .await
        .ok()?;
        if !output.status.success() {
            return None;
        }
        serde_json::from_str::<PrView>(output.stdout.trim())
            .ok()
            .map(|view| view.url)
    }

    async fn create_pr(&self, branch: &str, ticket_id: &str) -> Result<String> {
        let title = format!("AI Implementation for Ticket {ticket_id}");
        let output = run_captured(
            &self.gh_bin,
            &[
                "pr",
                "create",
                "--head",
                branch,
                "--base",
                &self.base_branch,
                "--title",
                &title,
                "--body",
                "This pull request was generated automatically from the ticket's implementation plan.",
            ],
            self.workspace,
        )
        .await?;
        if !output.status.success() {
            return Err(Error::Vcs {
                op: "gh pr create",
                detail: output.combined().trim().to_string(),
            });
        }
        // gh prints the new PR's URL on stdout.
        Ok(output.stdout.trim().to_string())
    }
}
