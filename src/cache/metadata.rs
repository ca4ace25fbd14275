//! The metadata TTL cache (§4.2): `remote_path -> (Option<FileInfo>, inserted_at)`
//! with LRU eviction once the entry-count cap is reached.
//!
//! Modeled after the teacher's `AttributeCache` (`client/src/fs/cache.rs`),
//! generalized from a fixed choice of TTL-or-LRU-or-none into a single
//! TTL-bounded, LRU-capped cache as required by §4.2 (both a staleness
//! bound and a hard size cap apply simultaneously, rather than being
//! alternative strategies).

use crate::remote::types::FileInfo;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(60);
const DEFAULT_CAPACITY: usize = 10_000;

struct Entry {
    info: Option<FileInfo>,
    inserted_at: Instant,
}

struct Inner {
    entries: LruCache<String, Entry>,
    ttl: Duration,
}

/// Thread-safe metadata cache. A single coarse mutex guards the LRU map;
/// per §4.2 "concurrent readers are supported; writers serialize" is
/// satisfied at the granularity of this lock (the `lru` crate's `get`
/// itself mutates recency order, so even reads take the lock).
pub struct MetadataCache {
    inner: Mutex<Inner>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_TTL, DEFAULT_CAPACITY)
    }

    pub fn with_config(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                ttl,
            }),
        }
    }

    /// Returns `(info, hit)`. A miss includes expired entries, which are
    /// evicted as part of the lookup.
    pub fn get(&self, remote_path: &str) -> (Option<Option<FileInfo>>, bool) {
        let mut inner = self.inner.lock().unwrap();
        let ttl = inner.ttl;
        if let Some(entry) = inner.entries.get(remote_path) {
            if entry.inserted_at.elapsed() <= ttl {
                return (Some(entry.info.clone()), true);
            }
        } else {
            return (None, false);
        }
        inner.entries.pop(remote_path);
        (None, false)
    }

    /// Records a positive (`Some`) or negative (`None`) result.
    pub fn set(&self, remote_path: &str, info_or_negative: Option<FileInfo>) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.put(
            remote_path.to_string(),
            Entry {
                info: info_or_negative,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, remote_path: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.pop(remote_path);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::types::ObjectType;
    use std::time::SystemTime;

    fn info(path: &str) -> FileInfo {
        FileInfo {
            remote_path: path.to_string(),
            object_type: ObjectType::File,
            size: 5,
            modified_at: SystemTime::now(),
            object_id: None,
            resource_id: None,
            signed_url: None,
        }
    }

    #[test]
    fn miss_then_hit() {
        let cache = MetadataCache::new();
        let (v, hit) = cache.get("a");
        assert!(!hit);
        assert!(v.is_none());

        cache.set("a", Some(info("a")));
        let (v, hit) = cache.get("a");
        assert!(hit);
        assert_eq!(v.unwrap().unwrap().remote_path, "a");
    }

    #[test]
    fn negative_entries_are_honored() {
        let cache = MetadataCache::new();
        cache.set("missing", None);
        let (v, hit) = cache.get("missing");
        assert!(hit);
        assert!(v.unwrap().is_none());
    }

    #[test]
    fn ttl_expiry_is_a_miss() {
        let cache = MetadataCache::with_config(Duration::from_millis(1), 100);
        cache.set("a", Some(info("a")));
        std::thread::sleep(Duration::from_millis(20));
        let (v, hit) = cache.get("a");
        assert!(!hit);
        assert!(v.is_none());
    }

    #[test]
    fn lru_eviction_on_capacity_overflow() {
        let cache = MetadataCache::with_config(Duration::from_secs(60), 2);
        cache.set("a", Some(info("a")));
        cache.set("b", Some(info("b")));
        cache.set("c", Some(info("c")));
        assert_eq!(cache.len(), 2);
        let (v, hit) = cache.get("a");
        assert!(!hit);
        assert!(v.is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = MetadataCache::new();
        cache.set("a", Some(info("a")));
        cache.invalidate("a");
        let (_, hit) = cache.get("a");
        assert!(!hit);
    }
}
