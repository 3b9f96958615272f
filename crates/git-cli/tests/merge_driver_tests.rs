//! Integration tests for the `merge-resolve` and `merge-octopus` plumbing
//! commands: `<bases>... -- <head> <remote>...` argument grammar and exit
//! codes.

mod common;
use common::*;

fn setup_octopus_topology(dir: &std::path::Path) {
    setup_empty_repo(dir);

    std::fs::write(dir.join("base.txt"), "base\n").unwrap();
    git(dir, &["add", "base.txt"]);
    git(dir, &["commit", "-m", "base"]);

    git(dir, &["branch", "topic1"]);
    git(dir, &["branch", "topic2"]);

    git(dir, &["checkout", "topic1"]);
    std::fs::write(dir.join("topic1.txt"), "topic1\n").unwrap();
    git(dir, &["add", "topic1.txt"]);
    git(dir, &["commit", "-m", "topic1"]);

    git(dir, &["checkout", "topic2"]);
    std::fs::write(dir.join("topic2.txt"), "topic2\n").unwrap();
    git(dir, &["add", "topic2.txt"]);
    git(dir, &["commit", "-m", "topic2"]);

    git(dir, &["checkout", "main"]);
}

// ──────────────────────────── merge-resolve ────────────────────────────

#[test]
fn merge_resolve_missing_separator_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    setup_branched_history(dir.path());

    let result = gitr(dir.path(), &["merge-resolve", "main", "feature"]);
    assert_eq!(result.exit_code, 2);
}

#[test]
fn merge_resolve_baseless_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    setup_branched_history(dir.path());

    let result = gitr(dir.path(), &["merge-resolve", "--", "main", "feature"]);
    assert_eq!(result.exit_code, 2);
}

#[test]
fn merge_resolve_too_many_remotes_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    setup_branched_history(dir.path());
    let base = git(dir.path(), &["merge-base", "main", "feature"]).stdout.trim().to_string();

    let result = gitr(dir.path(), &["merge-resolve", &base, "--", "main", "feature", "feature"]);
    assert_eq!(result.exit_code, 2);
}

#[test]
fn merge_resolve_clean_merge_with_explicit_base_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    setup_branched_history(dir.path());
    let base = git(dir.path(), &["merge-base", "main", "feature"]).stdout.trim().to_string();

    let result = gitr(dir.path(), &["merge-resolve", &base, "--", "main", "feature"]);
    assert_eq!(result.exit_code, 0, "stderr: {}", result.stderr);
}

// ──────────────────────────── merge-octopus ────────────────────────────

#[test]
fn merge_octopus_missing_separator_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    setup_octopus_topology(dir.path());

    let result = gitr(dir.path(), &["merge-octopus", "main", "topic1", "topic2"]);
    assert_eq!(result.exit_code, 2);
}

#[test]
fn merge_octopus_fewer_than_two_remotes_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    setup_octopus_topology(dir.path());

    let result = gitr(dir.path(), &["merge-octopus", "--", "main", "topic1"]);
    assert_eq!(result.exit_code, 2);
}

#[test]
fn merge_octopus_clean_merge_with_explicit_base_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    setup_octopus_topology(dir.path());
    let base = git(dir.path(), &["rev-parse", "main"]).stdout.trim().to_string();

    let result = gitr(dir.path(), &["merge-octopus", &base, "--", "main", "topic1", "topic2"]);
    assert_eq!(result.exit_code, 0, "stderr: {}", result.stderr);
}
