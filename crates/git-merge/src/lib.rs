//! Merge engine: three-way content merge and tree-level merge driving.
//!
//! The tree-merge drivers ([`ResolveDriver`], [`OctopusDriver`]) build on a
//! small set of per-path primitives: [`path_merger`] decides what a single
//! path's merge outcome is, [`IndexWalker`] dispatches those decisions across
//! the whole index, [`IndexLock`] guards the on-disk index while a driver
//! mutates it, and [`OutcomeReporter`] carries the progress/error messages
//! back to the caller.

pub mod content;
pub mod external_program;
pub mod index_walker;
pub mod lock;
pub mod octopus;
pub mod path_merger;
pub mod report;
pub mod resolve;

use std::path::PathBuf;

use bstr::BString;
use git_diff::DiffAlgorithm;
use git_hash::ObjectId;

pub use external_program::ExternalProgramCallback;
pub use index_walker::IndexWalker;
pub use lock::IndexLock;
pub use octopus::OctopusDriver;
pub use path_merger::{BlobRef, ConflictOutcome, PathMergeContext, PathMergeInput, Side, TypeConflictKind};
pub use report::OutcomeReporter;
pub use resolve::ResolveDriver;

/// Options for merge operations.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Which merge strategy to use.
    pub strategy: MergeStrategyType,
    /// Strategy-specific options (e.g. "theirs", "patience").
    pub strategy_options: Vec<String>,
    /// Diff algorithm for content merge.
    pub diff_algorithm: DiffAlgorithm,
    /// Similarity threshold for rename detection (0-100, default 50).
    pub rename_threshold: u8,
    /// Conflict marker style.
    pub conflict_style: ConflictStyle,
    /// Allow merging unrelated histories.
    pub allow_unrelated_histories: bool,
    /// External program (`merge.tool`) to hand per-path content merges off
    /// to instead of the built-in line merge. `None` uses the built-in merge.
    pub external_merge_program: Option<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategyType::Ort,
            strategy_options: Vec::new(),
            diff_algorithm: DiffAlgorithm::Myers,
            rename_threshold: 50,
            conflict_style: ConflictStyle::Merge,
            allow_unrelated_histories: false,
            external_merge_program: None,
        }
    }
}

/// Available merge strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategyType {
    /// ORT strategy (default since git 2.34).
    Ort,
    /// Legacy recursive strategy.
    Recursive,
    /// Always take our side.
    Ours,
    /// Subtree merge.
    Subtree,
    /// Octopus merge (3+ branches).
    Octopus,
}

impl MergeStrategyType {
    /// Parse a strategy name string (as used by `git merge -s <strategy>`).
    ///
    /// Accepted values: "ort", "recursive", "ours", "subtree", "octopus".
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ort" => Some(Self::Ort),
            "recursive" => Some(Self::Recursive),
            "ours" => Some(Self::Ours),
            "subtree" => Some(Self::Subtree),
            "octopus" => Some(Self::Octopus),
            _ => None,
        }
    }

    /// Return the canonical name for this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ort => "ort",
            Self::Recursive => "recursive",
            Self::Ours => "ours",
            Self::Subtree => "subtree",
            Self::Octopus => "octopus",
        }
    }
}

/// Conflict marker style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStyle {
    /// Default: show ours and theirs only.
    Merge,
    /// Include base content between `|||||||` markers.
    Diff3,
    /// Zealous diff3: reduce conflict size by pulling out common prefix/suffix.
    ZDiff3,
}

impl ConflictStyle {
    /// Parse a conflict style name (as used by `merge.conflictStyle` config).
    ///
    /// Accepted values: "merge", "diff3", "zdiff3".
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "merge" => Some(Self::Merge),
            "diff3" => Some(Self::Diff3),
            "zdiff3" => Some(Self::ZDiff3),
            _ => None,
        }
    }

    /// Return the canonical config name for this style.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Diff3 => "diff3",
            Self::ZDiff3 => "zdiff3",
        }
    }
}

/// Result of a three-way content merge.
#[derive(Debug, Clone)]
pub enum ContentMergeResult {
    /// Clean merge, no conflicts.
    Clean(Vec<u8>),
    /// Conflict with markers in the content.
    Conflict {
        /// Merged content including conflict markers.
        content: Vec<u8>,
        /// Number of conflict regions.
        conflict_count: usize,
    },
}

impl ContentMergeResult {
    /// Whether the merge was clean.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean(_))
    }

    /// Get the merged content (with or without conflict markers).
    pub fn content(&self) -> &[u8] {
        match self {
            Self::Clean(data) => data,
            Self::Conflict { content, .. } => content,
        }
    }
}

/// Error types for merge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("merge conflict in {path}")]
    Conflict { path: BString },

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("expected {expected} object, got {actual} for {oid}")]
    UnexpectedObjectType {
        oid: ObjectId,
        expected: &'static str,
        actual: String,
    },

    #[error("invalid path: {0}")]
    InvalidPath(BString),

    #[error("unable to acquire index lock: {path}", path = path.display())]
    LockContention { path: PathBuf },

    #[error("failed to write the index")]
    IndexWriteFailure,

    #[error("unpack-trees failed: {0}")]
    UnpackTreesFailed(String),

    #[error("{path}: not in the cache")]
    NotInCache { path: BString },

    #[error("{path}: untracked {path} is overwritten by the merge")]
    UntrackedOverwrite { path: BString },

    #[error("{path}: deleted in one side and modified in the other")]
    DeletedModified { path: BString, side: path_merger::Side },

    #[error("{path}: permission conflict")]
    PermissionConflict { path: BString },

    #[error("{path}: not merging {kind:?} changes")]
    TypeConflict {
        path: BString,
        kind: path_merger::TypeConflictKind,
    },

    #[error("{path}: unhandled case (orig={orig} ours={ours} theirs={theirs})")]
    UnhandledCase {
        path: BString,
        orig: String,
        ours: String,
        theirs: String,
    },

    #[error("unable to find a common commit across all remotes")]
    NoCommonAncestor,

    #[error("octopus merge requires at least two remotes")]
    TooFewRemotes,

    #[error("external merge program '{program}' exited with status {status}")]
    ExternalProgramFailed { program: String, status: i32 },

    #[error(transparent)]
    Diff(#[from] git_diff::DiffError),

    #[error(transparent)]
    Odb(#[from] git_odb::OdbError),

    #[error(transparent)]
    Repo(#[from] git_repository::RepoError),

    #[error(transparent)]
    Index(#[from] git_index::IndexError),

    #[error(transparent)]
    RevWalk(#[from] git_revwalk::RevWalkError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read a commit object and return the tree it points at.
pub(crate) fn commit_tree(repo: &git_repository::Repository, commit: &ObjectId) -> Result<ObjectId, MergeError> {
    let obj = repo
        .odb()
        .read(commit)?
        .ok_or(MergeError::ObjectNotFound(*commit))?;
    match obj {
        git_object::Object::Commit(c) => Ok(c.tree),
        other => Err(MergeError::UnexpectedObjectType {
            oid: *commit,
            expected: "commit",
            actual: other.object_type().to_string(),
        }),
    }
}
