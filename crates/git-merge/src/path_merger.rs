//! Per-path three-way merge resolution.
//!
//! Given the (possibly absent) blob at a single path on each of the orig/
//! ours/theirs sides, decides whether the path is a clean add/delete, a
//! trivial take-one-side case, or needs a line-level content merge; then
//! updates the index and working tree to match.

use std::fs;
use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_index::{EntryFlags, Index, IndexEntry, Stage, StatData};
use git_object::{FileMode, Object};
use git_odb::ObjectDatabase;

use crate::content::{self, MergeLabels};
use crate::{MergeError, MergeOptions};
use crate::report::OutcomeReporter;

/// A blob identity: object id plus mode. Absence of a `BlobRef` means the
/// path doesn't exist on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobRef {
    pub oid: ObjectId,
    pub mode: FileMode,
}

/// Which side of a two-way disagreement a `DeletedModified` error names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Ours,
    Theirs,
}

/// The kind of content a [`MergeError::TypeConflict`] refuses to merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeConflictKind {
    Symlink,
    Submodule,
}

/// The inputs to a single path's three-way merge.
#[derive(Debug, Clone)]
pub struct PathMergeInput {
    pub path: BString,
    pub orig: Option<BlobRef>,
    pub ours: Option<BlobRef>,
    pub theirs: Option<BlobRef>,
}

/// Outcome of a single path merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictOutcome {
    Clean,
    ContentConflict,
    PermissionConflict {
        orig: Option<BlobRef>,
        ours: Option<BlobRef>,
        theirs: Option<BlobRef>,
    },
    TypeConflict {
        kind: TypeConflictKind,
    },
    DeletedModified {
        which_side: Side,
    },
    AddedDifferently,
}

/// Borrowed context a path merge runs against: the object database to read
/// blobs from, the working tree to materialize files in, the index to
/// stage results into, and where to send progress/error messages.
pub struct PathMergeContext<'a> {
    pub odb: &'a ObjectDatabase,
    pub work_tree: &'a Path,
    pub index: &'a mut Index,
    pub reporter: &'a mut OutcomeReporter,
    pub options: &'a MergeOptions,
    /// Suppress progress messages (errors are still reported).
    pub quiet: bool,
}

/// Resolve one path's merge, mutating the index and working tree.
///
/// Returns `Ok` with the outcome even when the outcome is a conflict —
/// conflicts are expected per-path results, not hard failures. Only
/// genuinely fatal conditions (I/O errors, an unhandled combination of
/// presence/absence) come back as `Err`.
pub fn merge_path(ctx: &mut PathMergeContext, input: PathMergeInput) -> Result<ConflictOutcome, MergeError> {
    let PathMergeInput { path, orig, ours, theirs } = input;
    validate_path(&path)?;

    match (orig, ours, theirs) {
        (None, None, None) => unreachable!("empty PathMergeInput is never dispatched"),

        // Deleted on both sides: already gone, nothing to do.
        (Some(_), None, None) => {
            clear_index_path(ctx.index, &path);
            Ok(ConflictOutcome::Clean)
        }

        // Deleted on theirs, present (possibly modified) on ours.
        (Some(o), Some(u), None) => {
            if o.mode == u.mode {
                if !ctx.quiet {
                    ctx.reporter.progress(&format!("Removing {path}"));
                }
                remove_worktree_file(ctx.work_tree, &path)?;
                clear_index_path(ctx.index, &path);
                Ok(ConflictOutcome::Clean)
            } else {
                ctx.reporter
                    .error(&format!("{path}: mode changed in one branch, deleted in the other"));
                Err(MergeError::DeletedModified { path, side: Side::Ours })
            }
        }

        // Deleted on ours, present (possibly modified) on theirs.
        (Some(o), None, Some(t)) => {
            if o.mode == t.mode {
                remove_worktree_file(ctx.work_tree, &path)?;
                clear_index_path(ctx.index, &path);
                Ok(ConflictOutcome::Clean)
            } else {
                ctx.reporter
                    .error(&format!("{path}: mode changed in one branch, deleted in the other"));
                Err(MergeError::DeletedModified { path, side: Side::Theirs })
            }
        }

        // Added only on ours: the working tree already has it (it's ours), just stage it.
        (None, Some(u), None) => {
            add_stage0(ctx.index, &path, u);
            Ok(ConflictOutcome::Clean)
        }

        // Added only on theirs.
        (None, None, Some(t)) => {
            if worktree_has_untracked(ctx.work_tree, &path, ctx.index)? {
                ctx.reporter
                    .error(&format!("{path}: untracked {path} is overwritten by the merge"));
                return Err(MergeError::UntrackedOverwrite { path });
            }
            if !ctx.quiet {
                ctx.reporter.progress(&format!("Adding {path}"));
            }
            add_stage0(ctx.index, &path, t);
            checkout_file(ctx.odb, ctx.work_tree, &path, t)?;
            Ok(ConflictOutcome::Clean)
        }

        // Present on both (possibly also on orig): trivial take-one-side, or content merge.
        (orig, Some(ours_blob), Some(theirs_blob)) => {
            merge_present_on_both(ctx, path, orig, ours_blob, theirs_blob)
        }
    }
}

fn merge_present_on_both(
    ctx: &mut PathMergeContext,
    path: BString,
    orig: Option<BlobRef>,
    ours: BlobRef,
    theirs: BlobRef,
) -> Result<ConflictOutcome, MergeError> {
    let added_in_both = orig.is_none();

    if ours == theirs {
        if added_in_both && !ctx.quiet {
            ctx.reporter.progress(&format!("Adding {path}"));
        }
        add_stage0(ctx.index, &path, ours);
        checkout_file(ctx.odb, ctx.work_tree, &path, ours)?;
        return Ok(ConflictOutcome::Clean);
    }

    if added_in_both && ours.mode != theirs.mode {
        ctx.reporter.error(&format!("{path}: permission conflict"));
        stage_conflict(ctx.index, &path, None, Some(ours), Some(theirs));
        return Err(MergeError::PermissionConflict { path });
    }

    if ours.mode == FileMode::Symlink || theirs.mode == FileMode::Symlink {
        ctx.reporter
            .error(&format!("{path}: Not merging symbolic link changes."));
        return Err(MergeError::TypeConflict {
            path,
            kind: TypeConflictKind::Symlink,
        });
    }
    if ours.mode == FileMode::Gitlink || theirs.mode == FileMode::Gitlink {
        ctx.reporter
            .error(&format!("{path}: Not merging submodule changes."));
        return Err(MergeError::TypeConflict {
            path,
            kind: TypeConflictKind::Submodule,
        });
    }

    if added_in_both && !ctx.quiet {
        ctx.reporter
            .progress(&format!("Added {path} in both, but differently."));
    }

    if let Some(program) = ctx.options.external_merge_program.clone() {
        return merge_with_external_program(ctx, path, orig, ours, theirs, &program);
    }

    let orig_bytes = match orig {
        Some(b) => read_blob(ctx.odb, b.oid)?,
        None => Vec::new(),
    };
    let ours_bytes = read_blob(ctx.odb, ours.oid)?;
    let theirs_bytes = read_blob(ctx.odb, theirs.oid)?;

    let labels = MergeLabels {
        base: "orig",
        ours: "our",
        theirs: "their",
    };
    let result = content::merge_content(&orig_bytes, &ours_bytes, &theirs_bytes, ctx.options, &labels);

    write_worktree_file(ctx.work_tree, &path, result.content(), ours.mode)?;

    let content_conflict = !result.is_clean() || added_in_both;

    if content_conflict {
        stage_conflict(ctx.index, &path, orig, Some(ours), Some(theirs));
        ctx.reporter
            .error(&format!("CONFLICT (content): Merge conflict in {path}"));
    }

    if ours.mode != theirs.mode {
        if !content_conflict {
            stage_conflict(ctx.index, &path, orig, Some(ours), Some(theirs));
        }
        ctx.reporter.error(&format!("{path}: permission conflict"));
        return Err(MergeError::PermissionConflict { path });
    }

    if content_conflict {
        return Err(MergeError::Conflict { path });
    }

    let oid = write_blob(ctx.odb, result.content())?;
    clear_index_path(ctx.index, &path);
    add_stage0(
        ctx.index,
        &path,
        BlobRef {
            oid,
            mode: ours.mode,
        },
    );
    Ok(ConflictOutcome::Clean)
}

/// Hand a path's content merge off to an external program (`merge.tool`)
/// instead of the built-in line merge. Materializes `ours` to the working
/// tree so the program has something to edit in place, invokes it, then
/// reads the result back and stages it as clean or conflicted depending on
/// the program's exit status.
fn merge_with_external_program(
    ctx: &mut PathMergeContext,
    path: BString,
    orig: Option<BlobRef>,
    ours: BlobRef,
    theirs: BlobRef,
    program: &str,
) -> Result<ConflictOutcome, MergeError> {
    checkout_file(ctx.odb, ctx.work_tree, &path, ours)?;

    let clean = crate::external_program::run_external_merge(
        program,
        orig.map(|b| (b.oid, b.mode)),
        Some((ours.oid, ours.mode)),
        Some((theirs.oid, theirs.mode)),
        BStr::new(path.as_slice()),
    )?;

    let fs_path = ctx.work_tree.join(path.to_str_lossy().as_ref());
    let merged = fs::read(&fs_path)?;

    if clean {
        let oid = write_blob(ctx.odb, &merged)?;
        clear_index_path(ctx.index, &path);
        add_stage0(ctx.index, &path, BlobRef { oid, mode: ours.mode });
        Ok(ConflictOutcome::Clean)
    } else {
        stage_conflict(ctx.index, &path, orig, Some(ours), Some(theirs));
        ctx.reporter
            .error(&format!("CONFLICT (content): Merge conflict in {path}"));
        Err(MergeError::Conflict { path })
    }
}

fn validate_path(path: &BString) -> Result<(), MergeError> {
    if path.is_empty() || path.contains(&0u8) || path.starts_with(b"/") {
        return Err(MergeError::InvalidPath(path.clone()));
    }
    if path
        .split(|&b| b == b'/')
        .any(|component| component == b"..")
    {
        return Err(MergeError::InvalidPath(path.clone()));
    }
    Ok(())
}

fn clear_index_path(index: &mut Index, path: &BStr) {
    index.remove(path, Stage::Normal);
    index.remove(path, Stage::Base);
    index.remove(path, Stage::Ours);
    index.remove(path, Stage::Theirs);
}

fn add_stage0(index: &mut Index, path: &BStr, blob: BlobRef) {
    clear_index_path(index, path);
    index.add(IndexEntry {
        path: BString::from(path),
        oid: blob.oid,
        mode: blob.mode,
        stage: Stage::Normal,
        stat: StatData::default(),
        flags: EntryFlags::default(),
    });
}

fn stage_conflict(
    index: &mut Index,
    path: &BStr,
    orig: Option<BlobRef>,
    ours: Option<BlobRef>,
    theirs: Option<BlobRef>,
) {
    index.remove(path, Stage::Normal);
    index.remove(path, Stage::Base);
    index.remove(path, Stage::Ours);
    index.remove(path, Stage::Theirs);

    for (stage, blob) in [
        (Stage::Base, orig),
        (Stage::Ours, ours),
        (Stage::Theirs, theirs),
    ] {
        if let Some(blob) = blob {
            index.add(IndexEntry {
                path: BString::from(path),
                oid: blob.oid,
                mode: blob.mode,
                stage,
                stat: StatData::default(),
                flags: EntryFlags::default(),
            });
        }
    }
}

fn worktree_has_untracked(work_tree: &Path, path: &BStr, index: &Index) -> Result<bool, MergeError> {
    let fs_path = work_tree.join(path.to_str_lossy().as_ref());
    if !fs_path.exists() {
        return Ok(false);
    }
    Ok(index.get_all(path).is_empty())
}

fn remove_worktree_file(work_tree: &Path, path: &BStr) -> Result<(), MergeError> {
    let fs_path = work_tree.join(path.to_str_lossy().as_ref());
    match fs::remove_file(&fs_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_worktree_file(work_tree: &Path, path: &BStr, content: &[u8], mode: FileMode) -> Result<(), MergeError> {
    let fs_path = work_tree.join(path.to_str_lossy().as_ref());
    if let Some(parent) = fs_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let _ = fs::remove_file(&fs_path);
    fs::write(&fs_path, content)?;
    #[cfg(unix)]
    if mode == FileMode::Executable {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&fs_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&fs_path, perms)?;
    }
    Ok(())
}

fn checkout_file(odb: &ObjectDatabase, work_tree: &Path, path: &BStr, blob: BlobRef) -> Result<(), MergeError> {
    let bytes = read_blob(odb, blob.oid)?;
    write_worktree_file(work_tree, path, &bytes, blob.mode)
}

fn read_blob(odb: &ObjectDatabase, oid: ObjectId) -> Result<Vec<u8>, MergeError> {
    if oid.is_null() {
        return Ok(Vec::new());
    }
    let obj = odb.read(&oid)?.ok_or(MergeError::ObjectNotFound(oid))?;
    match obj {
        Object::Blob(b) => Ok(b.data),
        other => Err(MergeError::UnexpectedObjectType {
            oid,
            expected: "blob",
            actual: other.object_type().to_string(),
        }),
    }
}

fn write_blob(odb: &ObjectDatabase, content: &[u8]) -> Result<ObjectId, MergeError> {
    let blob = Object::Blob(git_object::Blob {
        data: content.to_vec(),
    });
    Ok(odb.write(&blob)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MergeOptions;

    fn odb() -> (tempfile::TempDir, ObjectDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let odb = ObjectDatabase::open(dir.path()).unwrap();
        (dir, odb)
    }

    fn blob(odb: &ObjectDatabase, data: &[u8], mode: FileMode) -> BlobRef {
        let oid = write_blob(odb, data).unwrap();
        BlobRef { oid, mode }
    }

    #[test]
    fn delete_both_clears_index() {
        let (_d, odb) = odb();
        let work = tempfile::tempdir().unwrap();
        let mut index = Index::new();
        let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
        let options = MergeOptions::default();
        let mut ctx = PathMergeContext {
            odb: &odb,
            work_tree: work.path(),
            index: &mut index,
            reporter: &mut reporter,
            options: &options,
            quiet: false,
        };

        let orig = blob(ctx.odb, b"hi", FileMode::Regular);
        let result = merge_path(
            &mut ctx,
            PathMergeInput {
                path: "f".into(),
                orig: Some(orig),
                ours: None,
                theirs: None,
            },
        )
        .unwrap();

        assert_eq!(result, ConflictOutcome::Clean);
        assert!(index.conflicts().is_empty());
        assert!(index.get(BStr::new("f"), Stage::Normal).is_none());
    }

    #[test]
    fn add_in_both_identical_checks_out_and_stages_clean() {
        let (_d, odb) = odb();
        let work = tempfile::tempdir().unwrap();
        let mut index = Index::new();
        let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
        let options = MergeOptions::default();
        let content = blob(&odb, b"x", FileMode::Regular);
        let mut ctx = PathMergeContext {
            odb: &odb,
            work_tree: work.path(),
            index: &mut index,
            reporter: &mut reporter,
            options: &options,
            quiet: false,
        };

        let result = merge_path(
            &mut ctx,
            PathMergeInput {
                path: "f".into(),
                orig: None,
                ours: Some(content),
                theirs: Some(content),
            },
        )
        .unwrap();

        assert_eq!(result, ConflictOutcome::Clean);
        assert!(work.path().join("f").exists());
        assert!(index.get(BStr::new("f"), Stage::Normal).is_some());
    }

    #[test]
    fn add_in_both_different_content_conflicts() {
        let (_d, odb) = odb();
        let work = tempfile::tempdir().unwrap();
        let mut index = Index::new();
        let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
        let options = MergeOptions::default();
        let ours = blob(&odb, b"a\nb\n", FileMode::Regular);
        let theirs = blob(&odb, b"a\nc\n", FileMode::Regular);
        let mut ctx = PathMergeContext {
            odb: &odb,
            work_tree: work.path(),
            index: &mut index,
            reporter: &mut reporter,
            options: &options,
            quiet: false,
        };

        let err = merge_path(
            &mut ctx,
            PathMergeInput {
                path: "f".into(),
                orig: None,
                ours: Some(ours),
                theirs: Some(theirs),
            },
        )
        .unwrap_err();

        assert!(matches!(err, MergeError::Conflict { .. }));
        assert_eq!(index.conflicts().len(), 1);
    }

    #[test]
    fn symlink_change_refused() {
        let (_d, odb) = odb();
        let work = tempfile::tempdir().unwrap();
        let mut index = Index::new();
        let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
        let options = MergeOptions::default();
        let orig = blob(&odb, b"target", FileMode::Regular);
        let ours = blob(&odb, b"target2", FileMode::Symlink);
        let theirs = blob(&odb, b"target3", FileMode::Regular);
        let mut ctx = PathMergeContext {
            odb: &odb,
            work_tree: work.path(),
            index: &mut index,
            reporter: &mut reporter,
            options: &options,
            quiet: false,
        };

        let err = merge_path(
            &mut ctx,
            PathMergeInput {
                path: "link".into(),
                orig: Some(orig),
                ours: Some(ours),
                theirs: Some(theirs),
            },
        )
        .unwrap_err();

        assert!(matches!(
            err,
            MergeError::TypeConflict {
                kind: TypeConflictKind::Symlink,
                ..
            }
        ));
    }

    #[test]
    fn modify_delete_with_mode_change_errors() {
        let (_d, odb) = odb();
        let work = tempfile::tempdir().unwrap();
        let mut index = Index::new();
        let mut reporter = OutcomeReporter::new(Vec::new(), Vec::new());
        let options = MergeOptions::default();
        let orig = blob(&odb, b"a", FileMode::Regular);
        let ours = blob(&odb, b"a", FileMode::Executable);
        let mut ctx = PathMergeContext {
            odb: &odb,
            work_tree: work.path(),
            index: &mut index,
            reporter: &mut reporter,
            options: &options,
            quiet: false,
        };

        let err = merge_path(
            &mut ctx,
            PathMergeInput {
                path: "f".into(),
                orig: Some(orig),
                ours: Some(ours),
                theirs: None,
            },
        )
        .unwrap_err();

        assert!(matches!(err, MergeError::DeletedModified { .. }));
    }
}
