//! Unified-diff audit trail for staged changes.
//!
//! Diffs are recorded before anything is applied, independent of the
//! apply step, so a reviewer can always see what a run intended to do.

use std::fs;
use std::path::Path;

use similar::TextDiff;
use tracing::debug;

use crate::error::Result;

use super::staged_path;

/// Directory holding one diff per staged file.
pub const DIFF_DIR: &str = "diffs";

/// Concatenation of every diff produced in a run.
pub const COMBINED_DIFF_FILE: &str = "changes.diff";

/// Marker written to the combined artifact when a run staged nothing.
const NO_CHANGES_MARKER: &str = "No changes were generated in this run.\n";

/// Compute and persist a unified diff for every target with staged
/// content. New files are diffed against an empty original. Diff headers
/// reference the logical path, never the staging suffix.
///
/// The combined artifact is written unconditionally so that "nothing
/// changed" is itself an auditable outcome. Returns the number of
/// per-file diffs recorded.
pub fn record_diffs(workspace: &Path, targets: &[String]) -> Result<usize> {
    let diff_dir = workspace.join(DIFF_DIR);
    fs::create_dir_all(&diff_dir)?;

    let mut combined = String::new();
    let mut recorded = 0;

    for target in targets {
        let staged = staged_path(workspace, target);
        if !staged.exists() {
            continue;
        }

        let original = workspace.join(target);
        let old = if original.exists() {
            fs::read_to_string(&original)?
        } else {
            String::new()
        };
        let new = fs::read_to_string(&staged)?;

        let text_diff = TextDiff::from_lines(old.as_str(), new.as_str());
        let diff = text_diff
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{target}"), &format!("b/{target}"))
            .to_string();

        fs::write(diff_dir.join(diff_file_name(target)), &diff)?;
        combined.push_str(&diff);
        if !diff.is_empty() && !diff.ends_with('\n') {
            combined.push('\n');
        }
        recorded += 1;
    }

    if combined.is_empty() {
        combined.push_str(NO_CHANGES_MARKER);
    }
    fs::write(workspace.join(COMBINED_DIFF_FILE), &combined)?;

    debug!("recorded {} diff(s) under {}", recorded, diff_dir.display());
    Ok(recorded)
}

/// Filesystem-safe diff key for a target path.
fn diff_file_name(target: &str) -> String {
    let safe: String = target
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{safe}.diff")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_file_name_is_path_safe() {
        assert_eq!(diff_file_name("src/app.js"), "src_app.js.diff");
        assert_eq!(diff_file_name("a.txt"), "a.txt.diff");
    }
}
