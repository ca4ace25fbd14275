//! The dirty-node registry (§3, §5 Shutdown): tracks which inodes currently
//! hold unflushed data, so shutdown can walk exactly that set instead of
//! every live node.
//!
//! The teacher has no equivalent — `OpenWriteFile`s lived only in
//! `open_files`, keyed by file handle, and were flushed eagerly on
//! `release`. Nothing tracked "dirty but not yet released" across the
//! whole tree, so there was no shutdown-flush path to generalize from;
//! this is a new module built directly from §3's registry invariant.

use std::collections::HashSet;
use std::sync::Mutex;

/// Concurrent set of inode numbers whose buffer is currently dirty.
///
/// Invariant (§3): a node's inode is present iff its buffer is dirty. The
/// node engine is responsible for calling [`mark_dirty`](Self::mark_dirty)
/// and [`mark_clean`](Self::mark_clean) exactly when that transition
/// happens under the node's own lock.
pub struct DirtyNodeRegistry {
    inner: Mutex<HashSet<u64>>,
}

impl DirtyNodeRegistry {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashSet::new()) }
    }

    pub fn mark_dirty(&self, ino: u64) {
        self.inner.lock().unwrap().insert(ino);
    }

    pub fn mark_clean(&self, ino: u64) {
        self.inner.lock().unwrap().remove(&ino);
    }

    pub fn contains(&self, ino: u64) -> bool {
        self.inner.lock().unwrap().contains(&ino)
    }

    /// Snapshot of currently-dirty inodes, for the shutdown walk (§5).
    pub fn snapshot(&self) -> Vec<u64> {
        self.inner.lock().unwrap().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DirtyNodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_dirty_then_clean() {
        let reg = DirtyNodeRegistry::new();
        assert!(!reg.contains(1));
        reg.mark_dirty(1);
        assert!(reg.contains(1));
        reg.mark_clean(1);
        assert!(!reg.contains(1));
    }

    #[test]
    fn snapshot_reflects_current_members() {
        let reg = DirtyNodeRegistry::new();
        reg.mark_dirty(1);
        reg.mark_dirty(2);
        let mut snap = reg.snapshot();
        snap.sort();
        assert_eq!(snap, vec![1, 2]);
    }

    #[test]
    fn idempotent_mark() {
        let reg = DirtyNodeRegistry::new();
        reg.mark_dirty(1);
        reg.mark_dirty(1);
        assert_eq!(reg.len(), 1);
    }
}
