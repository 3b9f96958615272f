//! N-way ("octopus") merge driver: folds one remote at a time into a running
//! tree, subject to the rule that only the *last* remote processed is
//! allowed to leave hand-resolvable conflicts behind. Any earlier remote
//! that can't merge cleanly aborts the whole octopus.

use std::path::{Path, PathBuf};

use git_hash::ObjectId;
use git_index::UnpackFn;
use git_repository::Repository;
use git_revwalk::{merge_base_octopus, merge_bases_many};

use crate::report::OutcomeReporter;
use crate::resolve::merge_trees_two_phase;
use crate::{commit_tree, MergeError, MergeOptions};

pub struct OctopusDriver;

impl OctopusDriver {
    /// Merge `remotes` one at a time into `head`.
    ///
    /// `bases`, when non-empty, is used as the merge-base candidate set for
    /// every remote instead of computing it from the running `reference_commits`
    /// history; pass an empty slice to let each step compute its own bases.
    ///
    /// Returns the process exit code: `0` clean, `1` if the final remote
    /// left conflicts staged for manual resolution, `2` for a fatal failure
    /// or for an earlier (non-final) remote that couldn't merge cleanly.
    pub fn run(
        repo: &Repository,
        head: ObjectId,
        bases: &[ObjectId],
        remotes: &[ObjectId],
        options: &MergeOptions,
        reporter: &mut OutcomeReporter,
    ) -> Result<i32, MergeError> {
        if remotes.len() < 2 {
            return Err(MergeError::TooFewRemotes);
        }

        let work_tree = repo
            .work_tree()
            .ok_or_else(|| MergeError::UnpackTreesFailed("repository has no working tree".into()))?
            .to_path_buf();
        let index_path = repo.index_path().to_path_buf();

        if worktree_is_dirty(&index_path, &work_tree)? {
            reporter.error("Your local changes would be overwritten by merge. Aborting.");
            return Ok(2);
        }

        let mut reference_commits = vec![head];
        let mut reference_tree = commit_tree(repo, &head)?;
        let mut ret = 0;

        for (i, &remote) in remotes.iter().enumerate() {
            let is_last = i == remotes.len() - 1;

            if ret != 0 {
                reporter.error("Should not be doing an octopus.");
                return Ok(2);
            }

            let candidate_bases = if bases.is_empty() {
                merge_bases_many(repo, &remote, &reference_commits)?
            } else {
                bases.to_vec()
            };
            let base = match candidate_bases.len() {
                0 => return Err(MergeError::NoCommonAncestor),
                1 => candidate_bases[0],
                _ => merge_base_octopus(repo, &candidate_bases)?.ok_or(MergeError::NoCommonAncestor)?,
            };

            if base == remote {
                reporter.progress(&format!("Already up to date with {remote}"));
                continue;
            }

            if reference_commits.len() == 1 && base == reference_commits[0] {
                reporter.progress(&format!("Fast-forwarding to: {remote}"));
                reference_tree = commit_tree(repo, &remote)?;
                reference_commits = vec![remote];
                continue;
            }

            reporter.progress(&format!("Trying simple merge with {remote}"));
            let base_tree = commit_tree(repo, &base)?;
            let remote_tree = commit_tree(repo, &remote)?;
            let trees = [base_tree, reference_tree, remote_tree];

            let (code, tree) = merge_trees_two_phase(
                repo,
                &index_path,
                &work_tree,
                &trees,
                UnpackFn::ThreeWay,
                is_last,
                options,
                reporter,
            )?;

            match (code, tree) {
                (0, Some(t)) => {
                    reference_tree = t;
                    reference_commits.push(remote);
                }
                (1, None) if is_last => {
                    ret = 1;
                    reference_commits.push(remote);
                }
                _ => {
                    reporter.error(&format!("Simple merge did not work, aborting octopus at {remote}"));
                    return Ok(2);
                }
            }
        }

        Ok(ret)
    }
}

fn worktree_is_dirty(index_path: &Path, work_tree: &Path) -> Result<bool, MergeError> {
    let mut index = if index_path.exists() {
        git_index::Index::read_from(index_path)?
    } else {
        git_index::Index::new()
    };
    let changed = index.refresh(work_tree)?;
    Ok(!changed.is_empty())
}
