//! Scoped acquisition of the exclusive index lock.
//!
//! Thin merge-crate-facing wrapper over [`git_utils::lockfile::LockFile`]:
//! the locking protocol itself (create `index.lock` with `O_EXCL`, write,
//! atomic rename on commit, remove on drop) lives there unchanged. This
//! exists so drivers talk about "the index lock" rather than reaching past
//! the merge crate into `git-utils` directly, and so contention is always
//! surfaced as [`MergeError::LockContention`].

use std::path::Path;

use git_utils::lockfile::LockFile;

use crate::MergeError;

/// An acquired, exclusive lock on the on-disk index.
pub struct IndexLock {
    inner: LockFile,
}

impl IndexLock {
    /// Acquire the lock. Fails fatally (per the spec's "die on error") if
    /// another process already holds it.
    pub fn acquire(index_path: &Path) -> Result<Self, MergeError> {
        let inner = LockFile::acquire(index_path).map_err(|_| MergeError::LockContention {
            path: index_path.to_path_buf(),
        })?;
        Ok(Self { inner })
    }

    /// Consume the lock, writing `index` through it and committing.
    pub fn write_and_commit(self, index: &git_index::Index) -> Result<(), MergeError> {
        index
            .write_locked(self.inner)
            .map_err(|_| MergeError::IndexWriteFailure)
    }

    /// Release without writing: restores on-disk state to pre-acquisition.
    pub fn rollback(self) {
        let _ = self.inner.rollback();
    }
}
