//! Tests for the change pipeline: staging, diffing, applying.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use super::{apply_changes, record_diffs, staged_path, COMBINED_DIFF_FILE, DIFF_DIR};

fn stage(workspace: &Path, target: &str, content: &str) {
    let staged = staged_path(workspace, target);
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(staged, content).unwrap();
}

#[test]
fn test_apply_replaces_existing_file() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path();
    fs::write(workspace.join("foo.txt"), "old content").unwrap();
    stage(workspace, "foo.txt", "new content");

    let applied = apply_changes(workspace, &["foo.txt".to_string()]).unwrap();

    assert_eq!(applied, 1);
    assert_eq!(fs::read_to_string(workspace.join("foo.txt")).unwrap(), "new content");
    assert!(!staged_path(workspace, "foo.txt").exists());
}

#[test]
fn test_apply_creates_new_file_if_missing() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path();
    stage(workspace, "bar/baz.txt", "brand new file");

    let applied = apply_changes(workspace, &["bar/baz.txt".to_string()]).unwrap();

    assert_eq!(applied, 1);
    assert_eq!(
        fs::read_to_string(workspace.join("bar/baz.txt")).unwrap(),
        "brand new file"
    );
    assert!(!staged_path(workspace, "bar/baz.txt").exists());
}

#[test]
fn test_apply_skips_when_no_staged_file() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path();
    fs::write(workspace.join("untouched.txt"), "unchanged").unwrap();

    let applied = apply_changes(workspace, &["untouched.txt".to_string()]).unwrap();

    assert_eq!(applied, 0);
    assert_eq!(
        fs::read_to_string(workspace.join("untouched.txt")).unwrap(),
        "unchanged"
    );
}

#[test]
fn test_record_diffs_for_modified_file() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path();
    fs::write(workspace.join("a.txt"), "old\n").unwrap();
    stage(workspace, "a.txt", "new\n");

    let recorded = record_diffs(workspace, &["a.txt".to_string()]).unwrap();
    assert_eq!(recorded, 1);

    let diff = fs::read_to_string(workspace.join(DIFF_DIR).join("a.txt.diff")).unwrap();
    assert!(diff.contains("--- a/a.txt"));
    assert!(diff.contains("+++ b/a.txt"));
    assert!(diff.contains("-old"));
    assert!(diff.contains("+new"));
    assert!(!diff.contains(".new\n"), "diff headers must not leak the staging suffix");

    let combined = fs::read_to_string(workspace.join(COMBINED_DIFF_FILE)).unwrap();
    assert!(combined.contains("+new"));
}

#[test]
fn test_record_diffs_for_new_file_is_pure_addition() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path();
    stage(workspace, "fresh.txt", "hello\n");

    let recorded = record_diffs(workspace, &["fresh.txt".to_string()]).unwrap();
    assert_eq!(recorded, 1);

    let diff = fs::read_to_string(workspace.join(DIFF_DIR).join("fresh.txt.diff")).unwrap();
    assert!(diff.contains("+hello"));
    assert!(!diff.contains("\n-"));
}

#[test]
fn test_combined_diff_written_even_with_no_targets() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path();

    let recorded = record_diffs(workspace, &[]).unwrap();
    assert_eq!(recorded, 0);

    let combined = fs::read_to_string(workspace.join(COMBINED_DIFF_FILE)).unwrap();
    assert!(combined.contains("No changes"));
}

#[test]
fn test_second_run_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path();
    let targets = vec!["a.txt".to_string()];
    fs::write(workspace.join("a.txt"), "old\n").unwrap();
    stage(workspace, "a.txt", "new\n");

    record_diffs(workspace, &targets).unwrap();
    assert_eq!(apply_changes(workspace, &targets).unwrap(), 1);

    // Second run: no staged files remain, so nothing is diffed or applied
    // and previously applied content is untouched.
    let recorded = record_diffs(workspace, &targets).unwrap();
    assert_eq!(recorded, 0);
    assert_eq!(apply_changes(workspace, &targets).unwrap(), 0);
    assert_eq!(fs::read_to_string(workspace.join("a.txt")).unwrap(), "new\n");

    let combined = fs::read_to_string(workspace.join(COMBINED_DIFF_FILE)).unwrap();
    assert!(combined.contains("No changes"));
}

#[cfg(unix)]
mod generation {
    use super::*;
    use crate::changeset::{generate_changes, MANIFEST_FILE};
    use crate::config::Config;
    use crate::context::AppContext;
    use crate::error::Error;
    use std::os::unix::fs::PermissionsExt;
    use tokio::sync::mpsc;

    /// Fake agent: answers the enumeration prompt with a one-file target
    /// list and every regeneration prompt with fixed content.
    fn write_fake_agent(dir: &Path, listing_body: &str, file_body: &str) -> String {
        let agent = dir.join("fake-agent");
        let script = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"--list-sessions\" ]; then\n\
               echo '  1. dev (Just now) [5a249b28-9b10-499f-94f3-89cca14dc7c5]'\n\
               exit 0\n\
             fi\n\
             case \"$2\" in\n\
               *'JSON array'*) {listing_body} ;;\n\
               *'COMPLETE'*) {file_body} ;;\n\
             esac\n"
        );
        fs::write(&agent, script).unwrap();
        fs::set_permissions(&agent, fs::Permissions::from_mode(0o755)).unwrap();
        agent.to_str().unwrap().to_string()
    }

    fn test_context(agent_bin: String, tickets_root: &Path) -> AppContext {
        AppContext::new(Config::new(
            Some(agent_bin),
            Some(tickets_root.to_path_buf()),
            None,
        ))
    }

    #[tokio::test]
    async fn test_generate_stages_files_and_writes_manifest() {
        let tmp = TempDir::new().unwrap();
        let tickets_root = tmp.path().join("tickets");
        let workspace = tickets_root.join("COD-28");
        fs::create_dir_all(&workspace).unwrap();
        fs::write(workspace.join("a.txt"), "old").unwrap();

        let agent = write_fake_agent(
            tmp.path(),
            "echo 'data: [\"a.txt\"]'",
            "echo 'new'",
        );
        let ctx = test_context(agent, &tickets_root);

        let (tx, _rx) = mpsc::unbounded_channel();
        let change_set = generate_changes(&ctx, "COD-28", &tx).await.unwrap();

        assert_eq!(change_set.targets, vec!["a.txt".to_string()]);
        assert_eq!(change_set.generated, 1);
        assert_eq!(
            fs::read_to_string(staged_path(&workspace, "a.txt")).unwrap(),
            "new"
        );

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(workspace.join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["files"], serde_json::json!(["a.txt"]));
        assert!(manifest["generated_at"].is_string());
    }

    #[tokio::test]
    async fn test_generate_strips_code_fences_from_listing() {
        let tmp = TempDir::new().unwrap();
        let tickets_root = tmp.path().join("tickets");
        let workspace = tickets_root.join("COD-28");
        fs::create_dir_all(&workspace).unwrap();

        let agent = write_fake_agent(
            tmp.path(),
            "printf 'data: ```json\\ndata: [\"b.txt\"]\\ndata: ```\\n'",
            "echo 'content'",
        );
        let ctx = test_context(agent, &tickets_root);

        let (tx, _rx) = mpsc::unbounded_channel();
        let change_set = generate_changes(&ctx, "COD-28", &tx).await.unwrap();
        assert_eq!(change_set.targets, vec!["b.txt".to_string()]);
        assert_eq!(change_set.generated, 1);
    }

    #[tokio::test]
    async fn test_generate_fails_on_malformed_listing() {
        let tmp = TempDir::new().unwrap();
        let tickets_root = tmp.path().join("tickets");
        fs::create_dir_all(tickets_root.join("COD-28")).unwrap();

        let agent = write_fake_agent(tmp.path(), "echo 'not json at all'", "echo 'x'");
        let ctx = test_context(agent, &tickets_root);

        let (tx, _rx) = mpsc::unbounded_channel();
        let err = generate_changes(&ctx, "COD-28", &tx).await.unwrap_err();
        assert!(matches!(err, Error::TargetParse(_)));
    }

    #[tokio::test]
    async fn test_generate_skips_file_with_empty_output() {
        let tmp = TempDir::new().unwrap();
        let tickets_root = tmp.path().join("tickets");
        let workspace = tickets_root.join("COD-28");
        fs::create_dir_all(&workspace).unwrap();

        let agent = write_fake_agent(tmp.path(), "echo 'data: [\"a.txt\"]'", "true");
        let ctx = test_context(agent, &tickets_root);

        let (tx, _rx) = mpsc::unbounded_channel();
        let change_set = generate_changes(&ctx, "COD-28", &tx).await.unwrap();
        assert_eq!(change_set.generated, 0);
        assert!(!staged_path(&workspace, "a.txt").exists());
    }

    #[tokio::test]
    async fn test_generate_skips_unsafe_paths() {
        let tmp = TempDir::new().unwrap();
        let tickets_root = tmp.path().join("tickets");
        let workspace = tickets_root.join("COD-28");
        fs::create_dir_all(&workspace).unwrap();

        let agent = write_fake_agent(
            tmp.path(),
            "echo 'data: [\"../escape.txt\", \"ok.txt\"]'",
            "echo 'content'",
        );
        let ctx = test_context(agent, &tickets_root);

        let (tx, _rx) = mpsc::unbounded_channel();
        let change_set = generate_changes(&ctx, "COD-28", &tx).await.unwrap();
        assert_eq!(change_set.generated, 1);
        assert!(staged_path(&workspace, "ok.txt").exists());
        assert!(!tmp.path().join("tickets/escape.txt.new").exists());
    }

    /// End-to-end: stage, diff, apply for a one-file change.
    #[tokio::test]
    async fn test_full_pipeline_for_single_file() {
        let tmp = TempDir::new().unwrap();
        let tickets_root = tmp.path().join("tickets");
        let workspace = tickets_root.join("COD-28");
        fs::create_dir_all(&workspace).unwrap();
        fs::write(workspace.join("a.txt"), "old").unwrap();

        let agent = write_fake_agent(tmp.path(), "echo 'data: [\"a.txt\"]'", "echo 'new'");
        let ctx = test_context(agent, &tickets_root);

        let (tx, _rx) = mpsc::unbounded_channel();
        let change_set = generate_changes(&ctx, "COD-28", &tx).await.unwrap();

        let recorded = record_diffs(&workspace, &change_set.targets).unwrap();
        assert_eq!(recorded, 1);
        let diff = fs::read_to_string(workspace.join(DIFF_DIR).join("a.txt.diff")).unwrap();
        assert!(diff.contains("-old"));
        assert!(diff.contains("+new"));

        let applied = apply_changes(&workspace, &change_set.targets).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(fs::read_to_string(workspace.join("a.txt")).unwrap(), "new");
        assert!(!staged_path(&workspace, "a.txt").exists());

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(workspace.join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["files"], serde_json::json!(["a.txt"]));
    }
}
