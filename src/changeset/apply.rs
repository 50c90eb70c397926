//! Atomic promotion of staged files over their originals.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::Result;

use super::staged_path;

/// Replace each target with its staged counterpart, if one is present.
///
/// The swap is a rename, never a read-modify-write: a crash mid-apply can
/// lose a pending staged file but can never leave a half-written
/// destination. Targets without a staged file are skipped without error;
/// a partial phase B failure therefore produces a partial apply. Returns
/// the number of files applied.
pub fn apply_changes(workspace: &Path, targets: &[String]) -> Result<usize> {
    let mut applied = 0;
    for target in targets {
        let staged = staged_path(workspace, target);
        if !staged.exists() {
            debug!("no staged content for {}, skipping", target);
            continue;
        }

        let dest = workspace.join(target);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&staged, &dest)?;
        applied += 1;
    }
    Ok(applied)
}
