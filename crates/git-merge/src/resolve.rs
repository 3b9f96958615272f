//! Two-head merge driver: unpack-trees pass, then an automatic content-merge
//! pass over whatever unpack-trees left unmerged.
//!
//! Mirrors the classic `git merge-resolve` two-phase shape: try the cheap
//! structural merge first ("Trying simple merge."), and only fall back to
//! per-path content merging ("Simple merge failed, trying Automatic merge.")
//! when the tree can't be written as-is. [`merge_trees_two_phase`] is the
//! reusable core of this: the octopus driver runs the same two phases once
//! per remote, just with the tree list and the oneshot flag it needs.

use std::path::{Path, PathBuf};

use git_hash::ObjectId;
use git_index::{unpack_trees, Index, UnpackFn, UnpackOptions};
use git_repository::Repository;

use crate::index_walker::IndexWalker;
use crate::lock::IndexLock;
use crate::path_merger::{self, PathMergeContext};
use crate::report::OutcomeReporter;
use crate::{commit_tree, MergeError, MergeOptions};

pub struct ResolveDriver;

impl ResolveDriver {
    /// Merge `head` and `remote` against the (possibly absent) common
    /// `base`, staging conflicts the caller can resolve by hand.
    ///
    /// Returns the process exit code the caller should use: `0` clean,
    /// `1` conflicts staged for manual resolution, `2` a fatal failure
    /// (lock contention, an unreadable tree, unpack-trees refusing to run).
    pub fn run(
        repo: &Repository,
        base: Option<ObjectId>,
        head: Option<ObjectId>,
        remote: Option<ObjectId>,
        options: &MergeOptions,
        reporter: &mut OutcomeReporter,
    ) -> Result<i32, MergeError> {
        let work_tree = repo
            .work_tree()
            .ok_or_else(|| MergeError::UnpackTreesFailed("repository has no working tree".into()))?
            .to_path_buf();
        let index_path = repo.index_path().to_path_buf();

        let mut trees = Vec::new();
        if let Some(b) = base {
            trees.push(commit_tree(repo, &b)?);
        }
        if let Some(h) = head {
            trees.push(commit_tree(repo, &h)?);
        }
        if let Some(r) = remote {
            trees.push(commit_tree(repo, &r)?);
        }

        let fn_ = match trees.len() {
            0 => return Err(MergeError::UnpackTreesFailed("nothing to merge".into())),
            1 => UnpackFn::OneWay,
            2 => UnpackFn::TwoWay,
            _ => UnpackFn::ThreeWay,
        };

        let (code, _tree) = merge_trees_two_phase(
            repo,
            &index_path,
            &work_tree,
            &trees,
            fn_,
            false,
            options,
            reporter,
        )?;
        Ok(code)
    }
}

/// Run the unpack-trees pass followed, on failure to write a clean tree, by
/// the per-path automatic-merge pass. Shared by [`ResolveDriver`] and the
/// octopus driver, which runs this once per remote.
///
/// `oneshot` controls whether [`IndexWalker::merge_all`] stops at the first
/// hand-resolvable conflict (`false`, used by a plain two-head merge) or
/// keeps going to report every conflict (`true`, used by the octopus driver
/// so it can tell whether the *final* remote is the only one that left
/// conflicts behind).
///
/// Returns `(exit_code, tree)`: `tree` is `Some` only when the merge ended up
/// clean (exit code `0`).
pub(crate) fn merge_trees_two_phase(
    repo: &Repository,
    index_path: &Path,
    work_tree: &Path,
    trees: &[ObjectId],
    fn_: UnpackFn,
    oneshot: bool,
    options: &MergeOptions,
    reporter: &mut OutcomeReporter,
) -> Result<(i32, Option<ObjectId>), MergeError> {
    let lock = IndexLock::acquire(index_path)?;
    let mut index = load_index(index_path)?;
    let _ = index.refresh(work_tree)?;

    if unpack_trees(&mut index, repo.odb(), trees, &UnpackOptions { fn_, merge: true }).is_err() {
        lock.rollback();
        reporter.error("unpack-trees failed");
        return Ok((2, None));
    }

    reporter.progress("Trying simple merge.");
    lock.write_and_commit(&index)?;

    if let Ok(tree) = index.write_as_tree(repo.odb()) {
        return Ok((0, Some(tree)));
    }

    reporter.progress("Simple merge failed, trying Automatic merge.");
    let lock = IndexLock::acquire(index_path)?;
    let mut index = load_index(index_path)?;

    let quiet = false;
    let conflicts = IndexWalker::merge_all(&mut index, oneshot, quiet, |idx, input| {
        let mut ctx = PathMergeContext {
            odb: repo.odb(),
            work_tree,
            index: idx,
            reporter,
            options,
            quiet,
        };
        path_merger::merge_path(&mut ctx, input)
    })?;

    lock.write_and_commit(&index)?;

    if conflicts != 0 {
        return Ok((1, None));
    }
    let tree = index.write_as_tree(repo.odb())?;
    Ok((0, Some(tree)))
}

fn load_index(path: &Path) -> Result<Index, MergeError> {
    if path.exists() {
        Ok(Index::read_from(path)?)
    } else {
        Ok(Index::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_object::{Blob, Commit as CommitObj, Object, Tree, TreeEntry};
    use git_utils::date::{GitDate, Signature};
    use proptest::prelude::*;

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn write_blob(repo: &Repository, data: &[u8]) -> ObjectId {
        repo.odb().write(&Object::Blob(Blob { data: data.to_vec() })).unwrap()
    }

    fn write_tree(repo: &Repository, entries: Vec<TreeEntry>) -> ObjectId {
        let mut tree = Tree::new();
        tree.entries = entries;
        tree.sort();
        repo.odb().write(&Object::Tree(tree)).unwrap()
    }

    fn write_commit(repo: &Repository, tree: ObjectId, parents: Vec<ObjectId>) -> ObjectId {
        let sig = Signature {
            name: "tester".into(),
            email: "tester@example.com".into(),
            date: GitDate::now(),
        };
        let commit = CommitObj {
            tree,
            parents,
            author: sig.clone(),
            committer: sig,
            encoding: None,
            gpgsig: None,
            extra_headers: Vec::new(),
            message: "m".into(),
        };
        repo.odb().write(&Object::Commit(commit)).unwrap()
    }

    #[test]
    fn clean_fast_forward_merge_returns_zero() {
        let (_dir, repo) = init_repo();
        let base_blob = write_blob(&repo, b"base");
        let their_blob = write_blob(&repo, b"theirs");

        let base_tree = write_tree(
            &repo,
            vec![TreeEntry { mode: git_object::FileMode::Regular, name: "f.txt".into(), oid: base_blob }],
        );
        let their_tree = write_tree(
            &repo,
            vec![TreeEntry { mode: git_object::FileMode::Regular, name: "f.txt".into(), oid: their_blob }],
        );

        let base_commit = write_commit(&repo, base_tree, vec![]);
        let their_commit = write_commit(&repo, their_tree, vec![base_commit]);

        let options = MergeOptions::default();
        let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
        let code = ResolveDriver::run(
            &repo,
            Some(base_commit),
            Some(base_commit),
            Some(their_commit),
            &options,
            &mut reporter,
        )
        .unwrap();

        assert_eq!(code, 0);
    }

    #[test]
    fn divergent_content_falls_back_to_automatic_merge_and_conflicts() {
        let (_dir, repo) = init_repo();
        let base_blob = write_blob(&repo, b"base\n");
        let our_blob = write_blob(&repo, b"ours\n");
        let their_blob = write_blob(&repo, b"theirs\n");

        let base_tree = write_tree(
            &repo,
            vec![TreeEntry { mode: git_object::FileMode::Regular, name: "f.txt".into(), oid: base_blob }],
        );
        let our_tree = write_tree(
            &repo,
            vec![TreeEntry { mode: git_object::FileMode::Regular, name: "f.txt".into(), oid: our_blob }],
        );
        let their_tree = write_tree(
            &repo,
            vec![TreeEntry { mode: git_object::FileMode::Regular, name: "f.txt".into(), oid: their_blob }],
        );

        let base_commit = write_commit(&repo, base_tree, vec![]);
        let our_commit = write_commit(&repo, our_tree, vec![base_commit]);
        let their_commit = write_commit(&repo, their_tree, vec![base_commit]);

        let options = MergeOptions::default();
        let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
        let code = ResolveDriver::run(
            &repo,
            Some(base_commit),
            Some(our_commit),
            Some(their_commit),
            &options,
            &mut reporter,
        )
        .unwrap();

        assert_eq!(code, 1);
    }

    proptest! {
        // P3: merging a tree into itself (base == head == remote) is
        // idempotent — running it twice against the same on-disk index
        // leaves the index byte-identical and exits 0 both times.
        #[test]
        fn idempotent_merge_of_a_tree_into_itself(data in proptest::collection::vec(any::<u8>(), 0..32)) {
            let (_dir, repo) = init_repo();
            let blob = write_blob(&repo, &data);
            let tree = write_tree(
                &repo,
                vec![TreeEntry { mode: git_object::FileMode::Regular, name: "f.txt".into(), oid: blob }],
            );
            let commit = write_commit(&repo, tree, vec![]);

            let options = MergeOptions::default();
            let index_path = repo.index_path().to_path_buf();

            let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
            let code_first = ResolveDriver::run(
                &repo,
                Some(commit),
                Some(commit),
                Some(commit),
                &options,
                &mut reporter,
            )
            .unwrap();
            let bytes_first = std::fs::read(&index_path).unwrap();

            let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
            let code_second = ResolveDriver::run(
                &repo,
                Some(commit),
                Some(commit),
                Some(commit),
                &options,
                &mut reporter,
            )
            .unwrap();
            let bytes_second = std::fs::read(&index_path).unwrap();

            prop_assert_eq!(code_first, 0);
            prop_assert_eq!(code_second, 0);
            prop_assert_eq!(bytes_first, bytes_second);
        }
    }
}
