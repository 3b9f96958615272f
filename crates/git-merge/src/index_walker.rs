//! Scans the index, groups unmerged stage-1/2/3 entries by path, and
//! dispatches each group to a merge callback.

use bstr::{BStr, BString};
use git_index::{Index, IndexEntry, Stage};

use crate::path_merger::{BlobRef, PathMergeInput};
use crate::MergeError;

/// Result of dispatching a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The path already had a stage-0 entry; nothing was dispatched.
    AlreadyMerged,
    /// The callback resolved the path cleanly.
    Resolved,
    /// The callback reported a hand-resolvable conflict for the path.
    Conflict,
}

pub struct IndexWalker;

impl IndexWalker {
    /// Dispatch a single path's unmerged stages to `cb`.
    ///
    /// A stage-0 entry already present means the path needs no work. If no
    /// entry at all is found for `path`, that's [`MergeError::NotInCache`] —
    /// a fatal setup error, not a conflict.
    ///
    /// `quiet` is carried through to callers for signature parity with the
    /// rest of the merge plumbing; this walker has no output of its own to
    /// suppress.
    pub fn merge_one_path(
        index: &mut Index,
        path: &BStr,
        _quiet: bool,
        mut cb: impl FnMut(&mut Index, PathMergeInput) -> Result<crate::ConflictOutcome, MergeError>,
    ) -> Result<WalkOutcome, MergeError> {
        if index.get(path, Stage::Normal).is_some() {
            return Ok(WalkOutcome::AlreadyMerged);
        }

        let input = collect_group(index, path).ok_or_else(|| MergeError::NotInCache {
            path: BString::from(path),
        })?;

        match cb(index, input) {
            Ok(_) => Ok(WalkOutcome::Resolved),
            Err(e) if is_path_conflict(&e) => Ok(WalkOutcome::Conflict),
            Err(e) => Err(e),
        }
    }

    /// Walk the whole index in lexicographic path order, dispatching every
    /// unmerged group. Returns the number of paths that came back as
    /// hand-resolvable conflicts.
    ///
    /// When `oneshot` is `false`, the first conflict aborts the walk
    /// immediately (matching the driver's "stop at the first hand-resolvable
    /// conflict" contract) and the count returned is capped at 1. When
    /// `oneshot` is `true`, the walk runs to completion and the count is
    /// exhaustive.
    pub fn merge_all(
        index: &mut Index,
        oneshot: bool,
        _quiet: bool,
        mut cb: impl FnMut(&mut Index, PathMergeInput) -> Result<crate::ConflictOutcome, MergeError>,
    ) -> Result<usize, MergeError> {
        // Snapshot first: cb mutates `index` as it resolves each group, but
        // the original stage-1/2/3 entries for the *next* path it hasn't
        // reached yet are never touched, so their relative order is stable.
        let snapshot: Vec<IndexEntry> = index.iter().cloned().collect();

        let mut conflict_count = 0;
        let mut i = 0;
        while i < snapshot.len() {
            if snapshot[i].stage == Stage::Normal {
                i += 1;
                continue;
            }

            let path = snapshot[i].path.clone();
            let mut k = 0;
            while i + k < snapshot.len() && snapshot[i + k].path == path {
                k += 1;
            }

            let input = group_to_input(&path, &snapshot[i..i + k]);
            match cb(index, input) {
                Ok(_) => {}
                Err(e) if is_path_conflict(&e) => {
                    conflict_count += 1;
                    if !oneshot {
                        return Ok(conflict_count);
                    }
                }
                Err(e) => return Err(e),
            }

            i += k;
        }

        Ok(conflict_count)
    }
}

fn is_path_conflict(err: &MergeError) -> bool {
    matches!(
        err,
        MergeError::Conflict { .. }
            | MergeError::PermissionConflict { .. }
            | MergeError::DeletedModified { .. }
            | MergeError::TypeConflict { .. }
            | MergeError::UnhandledCase { .. }
            | MergeError::UntrackedOverwrite { .. }
    )
}

fn collect_group(index: &Index, path: &BStr) -> Option<PathMergeInput> {
    let entries = index.get_all(path);
    if entries.is_empty() {
        return None;
    }
    let owned: Vec<IndexEntry> = entries.into_iter().cloned().collect();
    Some(group_to_input(&BString::from(path), &owned))
}

fn group_to_input(path: &BString, entries: &[IndexEntry]) -> PathMergeInput {
    let mut orig = None;
    let mut ours = None;
    let mut theirs = None;
    for e in entries {
        let blob = BlobRef {
            oid: e.oid,
            mode: e.mode,
        };
        match e.stage {
            Stage::Base => orig = Some(blob),
            Stage::Ours => ours = Some(blob),
            Stage::Theirs => theirs = Some(blob),
            Stage::Normal => {}
        }
    }
    PathMergeInput {
        path: path.clone(),
        orig,
        ours,
        theirs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_hash::ObjectId;
    use git_index::{EntryFlags, StatData};
    use git_object::FileMode;
    use proptest::prelude::*;

    fn entry(path: &str, stage: Stage, byte: u8) -> IndexEntry {
        IndexEntry {
            path: path.into(),
            oid: ObjectId::Sha1([byte; 20]),
            mode: FileMode::Regular,
            stage,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    #[test]
    fn already_merged_path_is_a_no_op() {
        let mut index = Index::new();
        index.add(entry("f", Stage::Normal, 1));
        let outcome = IndexWalker::merge_one_path(&mut index, BStr::new("f"), false, |_idx, _input| {
            panic!("callback should not run for an already-merged path")
        })
        .unwrap();
        assert_eq!(outcome, WalkOutcome::AlreadyMerged);
    }

    #[test]
    fn missing_path_is_not_in_cache() {
        let mut index = Index::new();
        let err = IndexWalker::merge_one_path(&mut index, BStr::new("missing"), false, |_idx, _input| {
            Ok(crate::ConflictOutcome::Clean)
        })
        .unwrap_err();
        assert!(matches!(err, MergeError::NotInCache { .. }));
    }

    #[test]
    fn merge_all_counts_conflicts_in_oneshot_mode() {
        let mut index = Index::new();
        index.add(entry("a", Stage::Ours, 1));
        index.add(entry("a", Stage::Theirs, 2));
        index.add(entry("b", Stage::Normal, 3));
        index.add(entry("c", Stage::Ours, 4));
        index.add(entry("c", Stage::Theirs, 5));

        let count = IndexWalker::merge_all(&mut index, true, false, |_idx, input| {
            Err(MergeError::Conflict { path: input.path })
        })
        .unwrap();

        assert_eq!(count, 2);
    }

    #[test]
    fn merge_all_aborts_on_first_conflict_when_not_oneshot() {
        let mut index = Index::new();
        index.add(entry("a", Stage::Ours, 1));
        index.add(entry("a", Stage::Theirs, 2));
        index.add(entry("c", Stage::Ours, 4));
        index.add(entry("c", Stage::Theirs, 5));

        let count = IndexWalker::merge_all(&mut index, false, false, |_idx, input| {
            Err(MergeError::Conflict { path: input.path })
        })
        .unwrap();

        assert_eq!(count, 1);
    }

    proptest! {
        // P1: every path ends the walk at exactly one stage-0 entry once the
        // callback resolves it cleanly.
        #[test]
        fn p1_resolved_paths_end_at_exactly_one_stage0_entry(
            names in proptest::collection::hash_set("[a-f][0-9]\\.txt", 1..6)
        ) {
            let mut index = Index::new();
            for (i, name) in names.iter().enumerate() {
                index.add(entry(name, Stage::Ours, (i * 2 + 1) as u8));
                index.add(entry(name, Stage::Theirs, (i * 2 + 2) as u8));
            }

            IndexWalker::merge_all(&mut index, true, false, |idx, input| {
                let path = BStr::new(input.path.as_slice());
                idx.remove(path, Stage::Ours);
                idx.remove(path, Stage::Theirs);
                idx.add(entry(&input.path.to_string(), Stage::Normal, 9));
                Ok(crate::ConflictOutcome::Clean)
            })
            .unwrap();

            for name in &names {
                let matches = index.get_all(BStr::new(name.as_str()));
                prop_assert_eq!(matches.len(), 1);
                prop_assert_eq!(matches[0].stage, Stage::Normal);
            }
        }

        // P2: paths the callback reports as conflicted keep their higher
        // stages and never pick up a stage-0 entry.
        #[test]
        fn p2_conflicted_paths_keep_higher_stages_and_no_stage0(
            names in proptest::collection::hash_set("[a-f][0-9]\\.txt", 1..6)
        ) {
            let mut index = Index::new();
            for (i, name) in names.iter().enumerate() {
                index.add(entry(name, Stage::Ours, (i * 2 + 1) as u8));
                index.add(entry(name, Stage::Theirs, (i * 2 + 2) as u8));
            }

            IndexWalker::merge_all(&mut index, true, false, |_idx, input| {
                Err(MergeError::Conflict { path: input.path })
            })
            .unwrap();

            for name in &names {
                let matches = index.get_all(BStr::new(name.as_str()));
                prop_assert!(matches.iter().all(|e| e.stage != Stage::Normal));
                prop_assert!(!matches.is_empty());
            }
        }
    }
}
