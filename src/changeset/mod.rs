//! Whole-file regeneration change pipeline.
//!
//! Rather than applying fragment edits, every target file is regenerated
//! in full by the agent, staged next to the original, diffed for audit,
//! and atomically swapped in. This removes fragile text-search patching
//! and its unique-match ambiguity; the cost is higher token usage and the
//! risk of the agent silently dropping unrelated content, which is why
//! every staged file is independently diffable before it is trusted.

mod apply;
mod diff;
mod generate;
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

pub use apply::apply_changes;
pub use diff::{record_diffs, COMBINED_DIFF_FILE, DIFF_DIR};
pub use generate::{generate_changes, ChangeSet, MANIFEST_FILE};

/// Suffix under which regenerated file content is staged pending apply.
pub const STAGED_SUFFIX: &str = ".new";

/// Staged counterpart of a target path. A change is pending while this
/// path exists and applied once it does not.
pub(crate) fn staged_path(workspace: &Path, target: &str) -> PathBuf {
    workspace.join(format!("{target}{STAGED_SUFFIX}"))
}
