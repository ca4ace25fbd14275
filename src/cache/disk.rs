//! The disk-resident content cache (§4.3): SHA-256 content-addressed
//! local files, LRU capacity enforcement, TTL freshness, and crash-
//! consistent startup reconciliation.
//!
//! Grounded on the pack's disk-cache examples: the atomic
//! write-temp-then-rename pattern and JSON sidecar index mirror
//! `other_examples` `turbocop::cache::ResultCache` (temp file + rename,
//! dirty-flag-gated flush), and the LRU-over-files structure follows
//! `other_examples` `databend::disk_cache::LruDiskCache` (an `lru`-backed
//! index where eviction walks from the tail).

use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::warn;

const INDEX_FILENAME: &str = ".index.json";
pub const DEFAULT_CAPACITY_BYTES: u64 = 10 * 1024 * 1024 * 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn hash_remote_path(remote_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(remote_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_millis(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn from_millis(ms: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_millis(ms)
}

#[derive(Debug, Clone)]
struct Entry {
    local_path: PathBuf,
    size: u64,
    remote_mtime: SystemTime,
    last_access: SystemTime,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    remote_path: String,
    size: u64,
    remote_mtime_ms: u64,
    last_access_ms: u64,
}

struct State {
    /// Keyed by remote path; the `lru` crate's own access order backs the
    /// eviction policy described in §4.3.
    entries: LruCache<String, Entry>,
    total_size: u64,
}

/// A single disk-resident content cache.
///
/// All mutating operations take a coarse lock for the index mutation only;
/// file I/O (writes, renames, unlinks) happens outside the lock, per §4.3
/// "Concurrency".
pub struct DiskCache {
    root: PathBuf,
    capacity: u64,
    ttl: Duration,
    disabled: bool,
    state: Mutex<State>,
}

pub struct CacheHit {
    pub local_path: PathBuf,
    pub size: u64,
}

impl DiskCache {
    pub fn new(root: PathBuf, capacity: u64, ttl: Duration) -> io::Result<Self> {
        Self::open(root, capacity, ttl, false)
    }

    pub fn disabled() -> Self {
        Self {
            root: PathBuf::new(),
            capacity: 0,
            ttl: Duration::ZERO,
            disabled: true,
            state: Mutex::new(State { entries: LruCache::unbounded(), total_size: 0 }),
        }
    }

    fn open(root: PathBuf, capacity: u64, ttl: Duration, disabled: bool) -> io::Result<Self> {
        if !disabled {
            fs::create_dir_all(&root)?;
            set_dir_mode_0700(&root)?;
        }
        let state = reconcile_on_startup(&root, ttl)?;
        Ok(Self { root, capacity, ttl, disabled, state: Mutex::new(state) })
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn local_path(&self, remote_path: &str) -> PathBuf {
        self.root.join(hash_remote_path(remote_path))
    }

    /// §4.3 `get`: a hit requires matching mtime, unexpired TTL, and an
    /// on-disk file that still exists.
    pub fn get(&self, remote_path: &str, expected_mtime: SystemTime) -> Option<CacheHit> {
        if self.disabled {
            return None;
        }

        let candidate = {
            let state = self.state.lock().unwrap();
            let entry = state.entries.peek(remote_path)?;
            if entry.remote_mtime != expected_mtime {
                return None;
            }
            if entry.last_access.elapsed().unwrap_or(Duration::ZERO) > self.ttl {
                None
            } else {
                Some((entry.local_path.clone(), entry.size))
            }
        }?;

        if !candidate.0.exists() {
            warn!(path = %candidate.0.display(), "disk cache entry missing underlying file, evicting");
            self.delete(remote_path);
            return None;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.entries.get_mut(remote_path) {
            entry.last_access = SystemTime::now();
        }
        Some(CacheHit { local_path: candidate.0, size: candidate.1 })
    }

    /// §4.3 `set`: atomic write (temp file + rename), then capacity
    /// enforcement via LRU eviction.
    pub fn set(&self, remote_path: &str, bytes: &[u8], remote_mtime: SystemTime) -> io::Result<PathBuf> {
        if self.disabled {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "disk cache disabled"));
        }

        let local_path = self.local_path(remote_path);
        write_atomic(&local_path, bytes)?;

        let size = bytes.len() as u64;
        let evicted = {
            let mut state = self.state.lock().unwrap();
            if let Some(old) = state.entries.peek(remote_path) {
                state.total_size = state.total_size.saturating_sub(old.size);
            }
            state.entries.put(
                remote_path.to_string(),
                Entry { local_path: local_path.clone(), size, remote_mtime, last_access: SystemTime::now() },
            );
            state.total_size += size;
            evict_over_capacity(&mut state, self.capacity)
        };

        for path in evicted {
            let _ = fs::remove_file(path);
        }
        self.persist_index();
        Ok(local_path)
    }

    /// §4.3 `delete`.
    pub fn delete(&self, remote_path: &str) {
        if self.disabled {
            return;
        }
        let removed = {
            let mut state = self.state.lock().unwrap();
            state.entries.pop(remote_path)
        };
        if let Some(entry) = removed {
            let mut state = self.state.lock().unwrap();
            state.total_size = state.total_size.saturating_sub(entry.size);
            drop(state);
            let _ = fs::remove_file(entry.local_path);
            self.persist_index();
        }
    }

    /// §4.3 `copy_to_cache`: move a staged local file into the cache.
    pub fn copy_to_cache(&self, remote_path: &str, source_local_path: &Path, remote_mtime: SystemTime) -> io::Result<PathBuf> {
        let bytes = fs::read(source_local_path)?;
        let result = self.set(remote_path, &bytes, remote_mtime)?;
        let _ = fs::remove_file(source_local_path);
        Ok(result)
    }

    pub fn total_size(&self) -> u64 {
        self.state.lock().unwrap().total_size
    }

    fn persist_index(&self) {
        if self.disabled {
            return;
        }
        let snapshot: Vec<PersistedEntry> = {
            let state = self.state.lock().unwrap();
            state
                .entries
                .iter()
                .map(|(remote_path, entry)| PersistedEntry {
                    remote_path: remote_path.clone(),
                    size: entry.size,
                    remote_mtime_ms: to_millis(entry.remote_mtime),
                    last_access_ms: to_millis(entry.last_access),
                })
                .collect()
        };
        let index_path = self.root.join(INDEX_FILENAME);
        if let Ok(json) = serde_json::to_vec(&snapshot) {
            let _ = write_atomic(&index_path, &json);
        }
    }
}

fn evict_over_capacity(state: &mut State, capacity: u64) -> Vec<PathBuf> {
    let mut evicted = Vec::new();
    while state.total_size > capacity {
        match state.entries.pop_lru() {
            Some((_, entry)) => {
                state.total_size = state.total_size.saturating_sub(entry.size);
                evicted.push(entry.local_path);
            }
            None => break,
        }
    }
    evicted
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
    fs::write(&tmp_path, bytes)?;
    set_file_mode_0600(&tmp_path)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode_0700(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_dir_mode_0700(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode_0600(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_file_mode_0600(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Rebuilds the index by loading the sidecar (if present) and cross-
/// checking it against files actually on disk. Orphan files (no
/// recoverable remote-path mapping) are deleted; entries older than TTL
/// are purged, per §4.3 "Invariants".
fn reconcile_on_startup(root: &Path, ttl: Duration) -> io::Result<State> {
    let mut state = State { entries: LruCache::unbounded(), total_size: 0 };
    if !root.exists() {
        return Ok(state);
    }

    let index_path = root.join(INDEX_FILENAME);
    let persisted: Vec<PersistedEntry> = fs::read(&index_path)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default();

    let mut by_hash: HashMap<String, PersistedEntry> = HashMap::new();
    for entry in persisted {
        let hash = hash_remote_path(&entry.remote_path);
        by_hash.insert(hash, entry);
    }

    let mut on_disk = Vec::new();
    for dir_entry in fs::read_dir(root)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name();
        let file_name = file_name.to_string_lossy().to_string();
        if file_name == INDEX_FILENAME || file_name.contains("tmp-") {
            continue;
        }
        on_disk.push((file_name, dir_entry.path(), dir_entry.metadata()?.len()));
    }

    let now = SystemTime::now();
    let mut recovered: Vec<(PersistedEntry, PathBuf, u64)> = Vec::new();
    for (hash, path, disk_size) in on_disk {
        match by_hash.remove(&hash) {
            Some(persisted) if persisted.size == disk_size => {
                let age = now.duration_since(from_millis(persisted.last_access_ms)).unwrap_or(Duration::ZERO);
                if age > ttl {
                    let _ = fs::remove_file(&path);
                } else {
                    recovered.push((persisted, path, disk_size));
                }
            }
            _ => {
                // Orphan: filenames are hashes, so the remote path cannot be
                // recovered. Must be removed to restore the size invariant.
                let _ = fs::remove_file(&path);
            }
        }
    }

    recovered.sort_by_key(|(persisted, _, _)| persisted.last_access_ms);
    for (persisted, path, size) in recovered {
        state.entries.put(
            persisted.remote_path.clone(),
            Entry {
                local_path: path,
                size,
                remote_mtime: from_millis(persisted.remote_mtime_ms),
                last_access: from_millis(persisted.last_access_ms),
            },
        );
        state.total_size += size;
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_set_then_get() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"), 1024 * 1024, Duration::from_secs(60)).unwrap();
        let mtime = SystemTime::now();
        let path = cache.set("a/b.txt", b"hello", mtime).unwrap();
        assert!(path.exists());

        let hit = cache.get("a/b.txt", mtime).unwrap();
        assert_eq!(hit.size, 5);
        assert_eq!(fs::read(&hit.local_path).unwrap(), b"hello");
    }

    #[test]
    fn mtime_mismatch_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"), 1024 * 1024, Duration::from_secs(60)).unwrap();
        let mtime = SystemTime::now();
        cache.set("a/b.txt", b"hello", mtime).unwrap();
        assert!(cache.get("a/b.txt", mtime + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn ttl_expiry_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"), 1024 * 1024, Duration::from_millis(1)).unwrap();
        let mtime = SystemTime::now();
        cache.set("a/b.txt", b"hello", mtime).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("a/b.txt", mtime).is_none());
    }

    #[test]
    fn capacity_overflow_evicts_lru() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"), 10, Duration::from_secs(60)).unwrap();
        let mtime = SystemTime::now();
        cache.set("first", b"0123456789", mtime).unwrap();
        // Touch "first" so it is MRU before inserting "second".
        cache.get("first", mtime);
        cache.set("second", b"9876543210", mtime).unwrap();
        assert!(cache.total_size() <= 10);
        assert!(cache.get("first", mtime).is_none());
        assert!(cache.get("second", mtime).is_some());
    }

    #[test]
    fn delete_removes_entry_and_file() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"), 1024, Duration::from_secs(60)).unwrap();
        let mtime = SystemTime::now();
        let path = cache.set("a", b"data", mtime).unwrap();
        cache.delete("a");
        assert!(!path.exists());
        assert!(cache.get("a", mtime).is_none());
    }

    #[test]
    fn startup_reconciliation_recovers_valid_entries_and_drops_orphans() {
        let dir = tempdir().unwrap();
        let cache_root = dir.path().join("cache");
        let mtime = SystemTime::now();
        {
            let cache = DiskCache::new(cache_root.clone(), 1024 * 1024, Duration::from_secs(600)).unwrap();
            cache.set("kept.txt", b"keep me", mtime).unwrap();
        }

        // Plant an orphan file with no index entry.
        fs::write(cache_root.join("deadbeef"), b"orphan").unwrap();

        let cache2 = DiskCache::new(cache_root.clone(), 1024 * 1024, Duration::from_secs(600)).unwrap();
        assert!(cache2.get("kept.txt", mtime).is_some());
        assert!(!cache_root.join("deadbeef").exists());
    }

    #[test]
    fn disabled_cache_short_circuits() {
        let cache = DiskCache::disabled();
        assert!(cache.is_disabled());
        assert!(cache.set("a", b"x", SystemTime::now()).is_err());
        assert!(cache.get("a", SystemTime::now()).is_none());
    }
}
