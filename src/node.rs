//! The node engine (§4.6): per-inode state and the filesystem operations
//! implemented against it.
//!
//! Per §9's design notes, the teacher's cyclic `inode_to_path` /
//! `path_to_inode` / `inode_to_type` triple (`client/src/fs/mod.rs`) is
//! replaced by an arena: nodes live in [`NodeTree`], a keyed map owned by
//! the engine, and parent/child links are stored as inode indices inside
//! each node rather than as `Rc<RefCell<..>>` pointers. A node carries its
//! own [`FileInfo`] (which already has `remote_path`), so there is no
//! separate `inode_to_path` table to keep in sync — lookups and renames
//! read and rewrite that one field directly.
//!
//! The teacher dispatches FUSE calls synchronously and bridges to async
//! remote calls with a single `block_on` per call
//! (`fs.runtime.block_on(...)`). Here the bridging point moves one layer
//! out — the engine's operations are themselves `async fn`s, awaited from
//! the `fuser::Filesystem` dispatcher in `src/fs/` — but per-node state is
//! guarded by a `tokio::sync::Mutex` rather than `std::sync::Mutex`
//! specifically so that the lock can be held across those awaited remote
//! calls, which §5 explicitly permits for a node's own state.

use crate::buffer::FileBuffer;
use crate::cache::disk::DiskCache;
use crate::error::{NodeError, RemoteError};
use crate::path::PathTranslator;
use crate::readdir::DirStreamEntry;
use crate::registry::DirtyNodeRegistry;
use crate::remote::types::{FileInfo, ObjectType};
use crate::remote::RemoteClient;
use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::os::unix::fs::FileExt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

pub const ROOT_INO: u64 = 1;

/// Operation-class deadlines wrapping remote calls, per §5.
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(60);
const DATA_TIMEOUT: Duration = Duration::from_secs(120);

const EMPTY_NOTEBOOK_JSON: &str = r#"{"cells":[],"metadata":{},"nbformat":4,"nbformat_minor":4}"#;

/// Which write paths have left a node's buffer dirty, per §3's
/// `dirty_flags` field.
#[derive(Debug, Default, Clone, Copy)]
struct DirtyFlags {
    data: bool,
    truncate: bool,
}

impl DirtyFlags {
    fn is_dirty(&self) -> bool {
        self.data || self.truncate
    }

    fn clear(&mut self) {
        self.data = false;
        self.truncate = false;
    }
}

pub struct OpenOutcome {
    pub direct_io: bool,
    pub keep_cache: bool,
}

pub struct NodeAttrView {
    pub ino: u64,
    pub size: u64,
    pub is_directory: bool,
    pub modified_at: SystemTime,
}

#[derive(Debug)]
struct NodeState {
    info: FileInfo,
    parent: Option<u64>,
    children: HashMap<String, u64>,
    buffer: FileBuffer,
    dirty: DirtyFlags,
    pending_truncate: bool,
    open_count: u32,
}

/// A single in-memory node. `ino` and the access-control fields are
/// immutable after construction; everything else lives behind the
/// per-node mutex, per §3 "Mutated only under its mutex".
#[derive(Debug)]
pub struct Node {
    pub ino: u64,
    pub owner_uid: u32,
    pub restrict_access: bool,
    state: AsyncMutex<NodeState>,
}

/// The arena: every live node, keyed by its stable inode number.
struct NodeTree {
    nodes: RwLock<HashMap<u64, Arc<Node>>>,
}

impl NodeTree {
    fn new(root: Arc<Node>) -> Self {
        let mut map = HashMap::new();
        map.insert(root.ino, root);
        Self { nodes: RwLock::new(map) }
    }

    fn get(&self, ino: u64) -> Option<Arc<Node>> {
        self.nodes.read().unwrap().get(&ino).cloned()
    }

    fn insert(&self, node: Arc<Node>) {
        self.nodes.write().unwrap().insert(node.ino, node);
    }

    fn remove(&self, ino: u64) {
        self.nodes.write().unwrap().remove(&ino);
    }
}

/// Derives a stable inode number from a [`FileInfo`], per §3: the
/// `object_id` when present and nonzero, else a hash of `resource_id` or
/// of the remote path. `DefaultHasher` uses fixed (non-randomized) keys,
/// so the result is stable across process restarts as long as the remote
/// identifier is.
fn stable_ino(info: &FileInfo) -> u64 {
    if let Some(object_id) = &info.object_id {
        if let Ok(n) = object_id.parse::<u64>() {
            if n != 0 {
                return n;
            }
        }
        let h = hash_str(object_id);
        if h != 0 {
            return h;
        }
    }
    if let Some(resource_id) = &info.resource_id {
        let h = hash_str(resource_id);
        if h != 0 {
            return h;
        }
    }
    let h = hash_str(&info.remote_path);
    if h == 0 {
        u64::MAX
    } else {
        h
    }
}

fn hash_str(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

fn join_path(parent_remote: &str, name: &str) -> String {
    if parent_remote.is_empty() {
        name.to_string()
    } else {
        format!("{parent_remote}/{name}")
    }
}

/// Rejects separators and the two synthetic directory entries, per §4.6
/// "Lookup" and §8's invalid-name invariant.
fn validate_name(name: &str) -> Result<(), NodeError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        Err(NodeError::InvalidArgument)
    } else {
        Ok(())
    }
}

fn read_range_from_file(path: &std::path::Path, offset: usize, len: usize) -> std::io::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    let file_len = file.metadata()?.len() as usize;
    if offset >= file_len {
        return Ok(Vec::new());
    }
    let end = (offset + len).min(file_len);
    let mut buf = vec![0u8; end - offset];
    file.read_at(&mut buf, offset as u64)?;
    Ok(buf)
}

fn slice_range(data: &[u8], offset: usize, len: usize) -> Vec<u8> {
    if offset >= data.len() {
        return Vec::new();
    }
    let end = (offset + len).min(data.len());
    data[offset..end].to_vec()
}

pub struct StatfsInfo {
    pub block_size: u32,
    pub total_blocks: u64,
    pub total_files: u64,
    pub name_len: u32,
}

/// Central per-mount state: the node arena plus the shared collaborators
/// every operation threads through (§2's control-flow summary).
pub struct NodeEngine {
    tree: NodeTree,
    remote: RemoteClient,
    disk_cache: DiskCache,
    dirty_registry: DirtyNodeRegistry,
    path_translator: PathTranslator,
    default_owner_uid: u32,
    restrict_access: bool,
}

impl NodeEngine {
    pub fn new(remote: RemoteClient, disk_cache: DiskCache, owner_uid: u32, restrict_access: bool) -> Self {
        let root_state = NodeState {
            info: FileInfo {
                remote_path: String::new(),
                object_type: ObjectType::Directory,
                size: 0,
                modified_at: SystemTime::now(),
                object_id: None,
                resource_id: None,
                signed_url: None,
            },
            parent: None,
            children: HashMap::new(),
            buffer: FileBuffer::empty(),
            dirty: DirtyFlags::default(),
            pending_truncate: false,
            open_count: 0,
        };
        let root = Arc::new(Node {
            ino: ROOT_INO,
            owner_uid,
            restrict_access,
            state: AsyncMutex::new(root_state),
        });
        Self {
            tree: NodeTree::new(root),
            remote,
            disk_cache,
            dirty_registry: DirtyNodeRegistry::new(),
            path_translator: PathTranslator::new(),
            default_owner_uid: owner_uid,
            restrict_access,
        }
    }

    pub fn dirty_registry(&self) -> &DirtyNodeRegistry {
        &self.dirty_registry
    }

    fn node(&self, ino: u64) -> Result<Arc<Node>, NodeError> {
        self.tree.get(ino).ok_or(NodeError::NoEntry)
    }

    async fn with_timeout<T, F>(duration: Duration, fut: F) -> Result<T, NodeError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(duration, fut).await {
            Ok(inner) => inner.map_err(NodeError::from),
            Err(_) => Err(NodeError::Io("operation timed out".to_string())),
        }
    }

    pub async fn attr(&self, ino: u64) -> Result<NodeAttrView, NodeError> {
        let node = self.node(ino)?;
        let st = node.state.lock().await;
        let size = if st.dirty.is_dirty() { st.buffer.size() } else { st.info.size };
        Ok(NodeAttrView { ino, size, is_directory: st.info.is_directory(), modified_at: st.info.modified_at })
    }

    pub fn statfs(&self) -> StatfsInfo {
        StatfsInfo { block_size: 4096, total_blocks: 1 << 30, total_files: 1 << 24, name_len: 255 }
    }

    /// §4.6 `ensure_data`, called with the node already locked.
    async fn ensure_data_locked(&self, state: &mut NodeState) -> Result<(), NodeError> {
        if state.dirty.is_dirty() || state.buffer.is_populated() {
            return Ok(());
        }
        if !self.disk_cache.is_disabled() {
            if let Some(hit) = self.disk_cache.get(&state.info.remote_path, state.info.modified_at) {
                state.buffer.set_cached(hit.local_path, hit.size);
                return Ok(());
            }
        }
        let bytes = Self::with_timeout(DATA_TIMEOUT, self.remote.read_all(&state.info)).await?;
        if !self.disk_cache.is_disabled() {
            if let Ok(local_path) = self.disk_cache.set(&state.info.remote_path, &bytes, state.info.modified_at) {
                state.buffer.set_cached(local_path, bytes.len() as u64);
                return Ok(());
            }
        }
        state.buffer.set_in_memory(bytes.to_vec());
        Ok(())
    }

    /// §4.6 "Open lifecycle".
    pub async fn open(&self, ino: u64, o_trunc: bool, write_intent: bool) -> Result<OpenOutcome, NodeError> {
        let node = self.node(ino)?;
        let mut state = node.state.lock().await;

        if !state.dirty.is_dirty() && !state.info.is_directory() {
            match Self::with_timeout(METADATA_TIMEOUT, self.remote.stat(&state.info.remote_path)).await {
                Ok(fresh) => {
                    if fresh.modified_at > state.info.modified_at {
                        state.buffer.clear();
                        self.disk_cache.delete(&state.info.remote_path);
                        state.info = fresh;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if o_trunc {
            self.remote.metadata_cache().invalidate(&state.info.remote_path);
            self.disk_cache.delete(&state.info.remote_path);
            state.buffer.clear();
            state.buffer.set_in_memory(Vec::new());
            state.buffer.mark_dirty();
            state.dirty.truncate = true;
            state.info.size = 0;
            state.info.modified_at = SystemTime::now();
            self.dirty_registry.mark_dirty(ino);
        } else if !state.buffer.is_populated() {
            self.ensure_data_locked(&mut state).await?;
        }

        state.open_count += 1;
        Ok(OpenOutcome { direct_io: write_intent, keep_cache: !write_intent })
    }

    /// §4.6 "Read". Out-of-range reads return an empty slice, not an error.
    pub async fn read(&self, ino: u64, offset: i64, size: u32) -> Result<Vec<u8>, NodeError> {
        if offset < 0 {
            return Err(NodeError::InvalidArgument);
        }
        let node = self.node(ino)?;
        let mut state = node.state.lock().await;

        if !state.buffer.is_populated() {
            self.ensure_data_locked(&mut state).await?;
        }

        if let Some(mem) = state.buffer.as_memory() {
            return Ok(slice_range(mem, offset as usize, size as usize));
        }
        if let Some(path) = state.buffer.cached_path().map(|p| p.to_path_buf()) {
            match read_range_from_file(&path, offset as usize, size as usize) {
                Ok(bytes) => return Ok(bytes),
                Err(_) => {
                    state.buffer.clear();
                    return Err(NodeError::Io("cached content file is missing".to_string()));
                }
            }
        }
        Ok(Vec::new())
    }

    /// §4.6 "Write". Rejects negative offsets; loads a cached-path buffer
    /// into memory first, since writes always operate on in-memory bytes.
    pub async fn write(&self, ino: u64, offset: i64, data: &[u8]) -> Result<u32, NodeError> {
        if offset < 0 {
            return Err(NodeError::InvalidArgument);
        }
        let node = self.node(ino)?;
        let mut state = node.state.lock().await;

        if state.buffer.cached_path().is_some() {
            self.load_cached_into_memory(&mut state)?;
        } else if !state.buffer.is_populated() {
            self.ensure_data_locked(&mut state).await?;
            if state.buffer.cached_path().is_some() {
                self.load_cached_into_memory(&mut state)?;
            }
        }

        let mut mem = state.buffer.take_memory().unwrap_or_default();
        let offset = offset as usize;
        let end = offset + data.len();
        if end > mem.len() {
            mem.resize(end, 0);
        }
        mem[offset..end].copy_from_slice(data);
        let new_len = mem.len() as u64;
        state.buffer.set_in_memory(mem);
        state.buffer.mark_dirty();
        state.dirty.data = true;
        state.info.size = new_len;
        state.info.modified_at = SystemTime::now();
        drop(state);
        self.dirty_registry.mark_dirty(ino);
        Ok(data.len() as u32)
    }

    fn load_cached_into_memory(&self, state: &mut NodeState) -> Result<(), NodeError> {
        if let Some(path) = state.buffer.cached_path().map(|p| p.to_path_buf()) {
            let bytes = std::fs::read(&path)?;
            state.buffer.set_in_memory(bytes);
        }
        Ok(())
    }

    /// §4.6 "Truncate", also used by `setattr`'s size-change path.
    async fn truncate_locked(&self, ino: u64, state: &mut NodeState, new_size: u64) -> Result<(), NodeError> {
        if new_size > 0 && !state.dirty.is_dirty() {
            if state.buffer.cached_path().is_some() || !state.buffer.is_populated() {
                self.ensure_data_locked(state).await?;
            }
            self.load_cached_into_memory(state)?;
        }
        let mut mem = state.buffer.take_memory().unwrap_or_default();
        mem.resize(new_size as usize, 0);
        state.buffer.set_in_memory(mem);
        state.buffer.mark_dirty();
        state.dirty.truncate = true;
        state.info.size = new_size;
        state.info.modified_at = SystemTime::now();
        self.dirty_registry.mark_dirty(ino);
        Ok(())
    }

    /// §4.6 "Setattr". Mode/uid/gid are rejected up front; an atime-only
    /// request (neither size nor mtime given) is rejected too, per the §9
    /// open-question decision recorded in DESIGN.md.
    pub async fn setattr(
        &self,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        mtime: Option<SystemTime>,
    ) -> Result<NodeAttrView, NodeError> {
        if mode.is_some() || uid.is_some() || gid.is_some() {
            return Err(NodeError::NotSupported);
        }
        let node = self.node(ino)?;
        let mut state = node.state.lock().await;

        if let Some(new_size) = size {
            if state.info.is_directory() {
                return Err(NodeError::IsADirectory);
            }
            self.truncate_locked(ino, &mut state, new_size).await?;
            self.remote.metadata_cache().invalidate(&state.info.remote_path);
            if state.open_count == 0 {
                self.flush_locked(ino, &mut state).await?;
            } else {
                state.pending_truncate = true;
            }
        } else if let Some(new_mtime) = mtime {
            state.info.modified_at = new_mtime;
            let remote_path = state.info.remote_path.clone();
            let info = state.info.clone();
            self.remote.metadata_cache().set(&remote_path, Some(info));
        } else {
            return Err(NodeError::NotSupported);
        }

        let effective_size = if state.dirty.is_dirty() { state.buffer.size() } else { state.info.size };
        Ok(NodeAttrView {
            ino,
            size: effective_size,
            is_directory: state.info.is_directory(),
            modified_at: state.info.modified_at,
        })
    }

    /// §4.6 "Flush": a no-op while any handle remains open, since multiple
    /// `flush` calls per `open` are possible (dup'd descriptors) and the
    /// real persistence point is `release`.
    pub async fn flush(&self, ino: u64) -> Result<(), NodeError> {
        let node = self.node(ino)?;
        let mut state = node.state.lock().await;
        if state.open_count > 0 {
            return Ok(());
        }
        self.flush_locked(ino, &mut state).await
    }

    /// §4.6 "fsync": unlike `flush`, always persists.
    pub async fn fsync(&self, ino: u64) -> Result<(), NodeError> {
        let node = self.node(ino)?;
        let mut state = node.state.lock().await;
        self.flush_locked(ino, &mut state).await
    }

    async fn flush_locked(&self, ino: u64, state: &mut NodeState) -> Result<(), NodeError> {
        if !state.dirty.is_dirty() || !state.buffer.is_populated() {
            return Ok(());
        }
        let bytes = match state.buffer.as_memory() {
            Some(mem) => Bytes::copy_from_slice(mem),
            None => return Ok(()),
        };
        let remote_path = state.info.remote_path.clone();
        let object_type = state.info.object_type;

        if object_type == ObjectType::Notebook {
            Self::with_timeout(DATA_TIMEOUT, self.remote.write_notebook(&remote_path, bytes.clone())).await?;
        } else {
            Self::with_timeout(DATA_TIMEOUT, self.remote.write(&remote_path, object_type, bytes.clone())).await?;
        }

        state.dirty.clear();
        state.pending_truncate = false;
        state.buffer.mark_clean();
        self.dirty_registry.mark_clean(ino);

        if let Ok(fresh) = Self::with_timeout(METADATA_TIMEOUT, self.remote.stat(&remote_path)).await {
            state.info = fresh;
        }
        if !self.disk_cache.is_disabled() {
            if let Ok(local_path) = self.disk_cache.set(&remote_path, &bytes, state.info.modified_at) {
                state.buffer.set_cached(local_path, bytes.len() as u64);
            }
        }
        Ok(())
    }

    /// §4.6 "Release".
    pub async fn release(&self, ino: u64) -> Result<(), NodeError> {
        let node = self.node(ino)?;
        let mut state = node.state.lock().await;
        if state.open_count == 0 {
            warn!(ino, "release called on a node with open_count already zero");
            return Ok(());
        }
        state.open_count -= 1;
        if state.open_count > 0 {
            return Ok(());
        }
        if !state.dirty.is_dirty() {
            state.buffer.clear();
            return Ok(());
        }
        let result = self.flush_locked(ino, &mut state).await;
        if result.is_ok() {
            state.buffer.clear();
        }
        result
    }

    /// §4.6 "Lookup".
    pub async fn lookup(&self, parent_ino: u64, name: &str) -> Result<Arc<Node>, NodeError> {
        validate_name(name)?;
        let parent = self.node(parent_ino)?;
        let (parent_remote, is_dir, existing_child) = {
            let st = parent.state.lock().await;
            (st.info.remote_path.clone(), st.info.is_directory(), st.children.get(name).copied())
        };
        if !is_dir {
            return Err(NodeError::NotADirectory);
        }

        if let Some(child_ino) = existing_child {
            if let Some(child) = self.tree.get(child_ino) {
                let dirty = child.state.lock().await.dirty.is_dirty();
                if dirty {
                    return Ok(child);
                }
            }
        }

        let fuse_child_path = join_path(&parent_remote, name);
        let info = Self::with_timeout(METADATA_TIMEOUT, self.remote.stat(&fuse_child_path)).await?;
        Ok(self.upsert_child(parent_ino, name, info).await)
    }

    async fn upsert_child(&self, parent_ino: u64, fuse_name: &str, info: FileInfo) -> Arc<Node> {
        let ino = stable_ino(&info);
        if let Some(existing) = self.tree.get(ino) {
            {
                let mut st = existing.state.lock().await;
                if !st.dirty.is_dirty() {
                    st.info = info;
                }
                st.parent = Some(parent_ino);
            }
            self.link_child(parent_ino, fuse_name, ino).await;
            return existing;
        }

        let (owner_uid, restrict_access) = match self.tree.get(parent_ino) {
            Some(parent) => (parent.owner_uid, parent.restrict_access),
            None => (self.default_owner_uid, self.restrict_access),
        };
        let node = Arc::new(Node {
            ino,
            owner_uid,
            restrict_access,
            state: AsyncMutex::new(NodeState {
                info,
                parent: Some(parent_ino),
                children: HashMap::new(),
                buffer: FileBuffer::empty(),
                dirty: DirtyFlags::default(),
                pending_truncate: false,
                open_count: 0,
            }),
        });
        self.tree.insert(node.clone());
        self.link_child(parent_ino, fuse_name, ino).await;
        node
    }

    async fn link_child(&self, parent_ino: u64, name: &str, child_ino: u64) {
        if let Some(parent) = self.tree.get(parent_ino) {
            parent.state.lock().await.children.insert(name.to_string(), child_ino);
        }
    }

    /// §4.6 "Create".
    pub async fn create(&self, parent_ino: u64, name: &str) -> Result<(Arc<Node>, OpenOutcome), NodeError> {
        validate_name(name)?;
        let parent = self.node(parent_ino)?;
        let parent_remote = parent.state.lock().await.info.remote_path.clone();
        let fuse_child_path = join_path(&parent_remote, name);
        let is_notebook = self.path_translator.has_notebook_suffix(name);
        let initial: Vec<u8> = if is_notebook { EMPTY_NOTEBOOK_JSON.as_bytes().to_vec() } else { Vec::new() };

        if is_notebook {
            Self::with_timeout(DATA_TIMEOUT, self.remote.write_notebook(&fuse_child_path, Bytes::from(initial.clone()))).await?;
        } else {
            Self::with_timeout(
                DATA_TIMEOUT,
                self.remote.write(&fuse_child_path, ObjectType::File, Bytes::from(initial.clone())),
            )
            .await?;
        }

        let info = Self::with_timeout(METADATA_TIMEOUT, self.remote.stat(&fuse_child_path)).await?;
        let node = self.upsert_child(parent_ino, name, info).await;
        {
            let mut st = node.state.lock().await;
            st.buffer.set_in_memory(initial);
            st.open_count += 1;
        }
        Ok((node, OpenOutcome { direct_io: true, keep_cache: false }))
    }

    pub async fn mkdir(&self, parent_ino: u64, name: &str) -> Result<Arc<Node>, NodeError> {
        validate_name(name)?;
        let parent = self.node(parent_ino)?;
        let parent_remote = parent.state.lock().await.info.remote_path.clone();
        let fuse_child_path = join_path(&parent_remote, name);
        Self::with_timeout(METADATA_TIMEOUT, self.remote.mkdir(&fuse_child_path)).await?;
        let info = Self::with_timeout(METADATA_TIMEOUT, self.remote.stat(&fuse_child_path)).await?;
        Ok(self.upsert_child(parent_ino, name, info).await)
    }

    pub async fn unlink(&self, parent_ino: u64, name: &str) -> Result<(), NodeError> {
        self.remove_child(parent_ino, name, false).await
    }

    pub async fn rmdir(&self, parent_ino: u64, name: &str) -> Result<(), NodeError> {
        self.remove_child(parent_ino, name, true).await
    }

    /// §4.6 "Unlink / Rmdir".
    async fn remove_child(&self, parent_ino: u64, name: &str, expect_dir: bool) -> Result<(), NodeError> {
        validate_name(name)?;
        let parent = self.node(parent_ino)?;
        let parent_remote = parent.state.lock().await.info.remote_path.clone();
        let fuse_child_path = join_path(&parent_remote, name);
        let info = Self::with_timeout(METADATA_TIMEOUT, self.remote.stat(&fuse_child_path)).await?;
        let is_dir = info.is_directory();
        if expect_dir && !is_dir {
            return Err(NodeError::NotADirectory);
        }
        if !expect_dir && is_dir {
            return Err(NodeError::IsADirectory);
        }

        Self::with_timeout(METADATA_TIMEOUT, self.remote.delete(&fuse_child_path, expect_dir)).await?;
        self.disk_cache.delete(&info.remote_path);

        let ino = stable_ino(&info);
        parent.state.lock().await.children.remove(name);
        self.tree.remove(ino);
        self.dirty_registry.mark_clean(ino);
        Ok(())
    }

    /// §4.6 "Rename". Subtree prefix rewrite walks with one lock held at a
    /// time, per §5's inversion-avoidance rule.
    pub async fn rename(&self, old_parent_ino: u64, old_name: &str, new_parent_ino: u64, new_name: &str) -> Result<(), NodeError> {
        validate_name(old_name)?;
        validate_name(new_name)?;
        let old_parent = self.node(old_parent_ino)?;
        let new_parent = self.node(new_parent_ino)?;
        let old_parent_remote = old_parent.state.lock().await.info.remote_path.clone();
        let new_parent_remote = new_parent.state.lock().await.info.remote_path.clone();
        let old_fuse_path = join_path(&old_parent_remote, old_name);
        let new_fuse_path = join_path(&new_parent_remote, new_name);

        Self::with_timeout(METADATA_TIMEOUT, self.remote.rename(&old_fuse_path, &new_fuse_path)).await?;

        let old_remote = self.path_translator.to_remote(&old_fuse_path);
        let new_remote = self.path_translator.to_remote(&new_fuse_path);
        self.disk_cache.delete(&old_remote);

        let moved_ino = old_parent.state.lock().await.children.remove(old_name);
        if let Some(ino) = moved_ino {
            new_parent.state.lock().await.children.insert(new_name.to_string(), ino);
            if let Some(node) = self.tree.get(ino) {
                let mut st = node.state.lock().await;
                st.parent = Some(new_parent_ino);
                st.info.remote_path = new_remote.clone();
            }
            self.rewrite_subtree_prefix(ino, &old_remote, &new_remote).await;
        }
        Ok(())
    }

    async fn rewrite_subtree_prefix(&self, root_ino: u64, old_prefix: &str, new_prefix: &str) {
        let mut queue: VecDeque<u64> = VecDeque::new();
        if let Some(node) = self.tree.get(root_ino) {
            queue.extend(node.state.lock().await.children.values().copied());
        }
        while let Some(ino) = queue.pop_front() {
            let Some(node) = self.tree.get(ino) else { continue };
            let mut st = node.state.lock().await;
            if let Some(rest) = st.info.remote_path.strip_prefix(old_prefix) {
                st.info.remote_path = format!("{new_prefix}{rest}");
            }
            queue.extend(st.children.values().copied());
        }
    }

    /// §4.6 "Readdir". Returns child entries only; `.`/`..` synthesis is
    /// the directory-stream adapter's job (`src/readdir.rs`).
    pub async fn read_dir(&self, ino: u64) -> Result<Vec<DirStreamEntry>, NodeError> {
        let node = self.node(ino)?;
        let (remote_path, is_dir) = {
            let st = node.state.lock().await;
            (st.info.remote_path.clone(), st.info.is_directory())
        };
        if !is_dir {
            return Err(NodeError::NotADirectory);
        }

        let entries = Self::with_timeout(DIRECTORY_TIMEOUT, self.remote.read_dir(&remote_path)).await?;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let is_directory = entry.info.is_directory();
            let fuse_name = entry.fuse_name.clone();
            let child = self.upsert_child(ino, &fuse_name, entry.info).await;
            out.push(DirStreamEntry { ino: child.ino, name: fuse_name, is_directory });
        }
        Ok(out)
    }

    /// §4.6 "Access".
    pub fn access(&self, node: &Node, caller_uid: Option<u32>) -> Result<(), NodeError> {
        if !node.restrict_access {
            return Ok(());
        }
        match caller_uid {
            Some(uid) if uid == node.owner_uid => Ok(()),
            _ => Err(NodeError::PermissionDenied),
        }
    }

    pub fn get_node(&self, ino: u64) -> Result<Arc<Node>, NodeError> {
        self.node(ino)
    }

    /// The node's parent inode, for `readdir`'s synthetic `..` entry.
    /// `None` only for the root, which is its own parent by convention.
    pub async fn parent_of(&self, ino: u64) -> u64 {
        match self.tree.get(ino) {
            Some(node) => node.state.lock().await.parent.unwrap_or(ROOT_INO),
            None => ROOT_INO,
        }
    }

    /// §4.6 "On-forget": a dirty buffer refuses to be dropped.
    pub async fn forget(&self, ino: u64) {
        if ino == ROOT_INO {
            return;
        }
        if let Some(node) = self.tree.get(ino) {
            let mut st = node.state.lock().await;
            if st.dirty.is_dirty() {
                return;
            }
            st.buffer.clear();
        }
    }

    /// §5 "Shutdown": flush every dirty node, returning those that could
    /// not be flushed.
    pub async fn flush_all_dirty(&self) -> Vec<u64> {
        let dirty = self.dirty_registry.snapshot();
        let mut remaining = Vec::new();
        for ino in dirty {
            if let Some(node) = self.tree.get(ino) {
                let mut st = node.state.lock().await;
                if self.flush_locked(ino, &mut st).await.is_err() {
                    remaining.push(ino);
                }
            }
        }
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::metadata::MetadataCache;

    fn file_info(path: &str, kind: ObjectType) -> FileInfo {
        FileInfo {
            remote_path: path.to_string(),
            object_type: kind,
            size: 0,
            modified_at: SystemTime::UNIX_EPOCH,
            object_id: None,
            resource_id: None,
            signed_url: None,
        }
    }

    #[test]
    fn validate_name_rejects_separators_and_dots() {
        assert!(validate_name("ok.txt").is_ok());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
    }

    #[test]
    fn stable_ino_prefers_object_id() {
        let mut info = file_info("a/b", ObjectType::File);
        info.object_id = Some("42".to_string());
        assert_eq!(stable_ino(&info), 42);
    }

    #[test]
    fn stable_ino_falls_back_to_path_hash_deterministically() {
        let info = file_info("a/b", ObjectType::File);
        assert_eq!(stable_ino(&info), stable_ino(&info));
        assert_ne!(stable_ino(&info), 0);
    }

    fn engine() -> NodeEngine {
        let remote = RemoteClient::new("http://localhost".to_string(), "token".to_string(), MetadataCache::new());
        let disk_cache = DiskCache::disabled();
        NodeEngine::new(remote, disk_cache, 501, false)
    }

    #[tokio::test]
    async fn root_node_is_a_directory() {
        let engine = engine();
        let attr = engine.attr(ROOT_INO).await.unwrap();
        assert!(attr.is_directory);
    }

    #[tokio::test]
    async fn lookup_rejects_bad_names() {
        let engine = engine();
        let err = engine.lookup(ROOT_INO, "a/b").await.unwrap_err();
        assert!(matches!(err, NodeError::InvalidArgument));
    }

    #[tokio::test]
    async fn release_without_open_is_reported_but_not_negative() {
        let engine = engine();
        // The root node was never opened; release should be a benign no-op.
        assert!(engine.release(ROOT_INO).await.is_ok());
    }
}
