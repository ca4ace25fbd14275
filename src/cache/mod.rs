//! The two-tier caching layer (§4.2, §4.3): an in-memory metadata TTL cache
//! and a disk-resident content cache.

pub mod disk;
pub mod metadata;
