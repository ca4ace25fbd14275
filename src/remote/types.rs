//! Wire and in-memory types for the remote workspace API, per §3 and §6.
//!
//! The client tolerates additional unknown JSON fields (§6): every
//! `Deserialize` derive here relies on serde's default "ignore unknown
//! fields" behavior rather than `deny_unknown_fields`.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::SystemTime;

/// Tagged union replacing the dynamic-downcast pattern flagged in §9's
/// design notes: the object type is matched exhaustively, never probed
/// with a type assertion that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    File,
    Directory,
    Notebook,
    Repo,
}

impl ObjectType {
    pub fn is_directory_like(&self) -> bool {
        matches!(self, ObjectType::Directory | ObjectType::Repo)
    }
}

/// A required-header map carried by a signed-URL descriptor. Headers are
/// applied verbatim to the signed-URL request (§4.4).
pub type HeaderMap = HashMap<String, String>;

#[derive(Debug, Clone, Deserialize)]
pub struct SignedUrlDescriptor {
    pub url: String,
    #[serde(default)]
    pub headers: HeaderMap,
}

/// Some remote API revisions return a single signed-URL object for a
/// large-write request, others a list; the client must be resilient to
/// either shape (§9 Open Questions) and use the first entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignedUrlResponse {
    Single(SignedUrlDescriptor),
    Many(Vec<SignedUrlDescriptor>),
}

impl SignedUrlResponse {
    pub fn first(self) -> Option<SignedUrlDescriptor> {
        match self {
            SignedUrlResponse::Single(d) => Some(d),
            SignedUrlResponse::Many(mut v) => {
                if v.is_empty() {
                    None
                } else {
                    Some(v.remove(0))
                }
            }
        }
    }
}

/// `FileInfo` per §3: everything the node engine needs to know about a
/// remote object, independent of how it was fetched (object-info or
/// list-files).
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub remote_path: String,
    pub object_type: ObjectType,
    pub size: u64,
    pub modified_at: SystemTime,
    pub object_id: Option<String>,
    pub resource_id: Option<String>,
    pub signed_url: Option<SignedUrlDescriptor>,
}

impl FileInfo {
    pub fn is_notebook(&self) -> bool {
        self.object_type == ObjectType::Notebook
    }

    pub fn is_directory(&self) -> bool {
        self.object_type.is_directory_like()
    }
}

/// Raw `object-info` response body.
#[derive(Debug, Deserialize)]
pub struct ObjectInfoResponse {
    pub path: String,
    pub object_type: ObjectType,
    #[serde(default)]
    pub size: u64,
    pub modified_at_ms: u64,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub signed_url: Option<SignedUrlDescriptor>,
}

impl ObjectInfoResponse {
    pub fn into_file_info(self) -> FileInfo {
        FileInfo {
            remote_path: self.path,
            object_type: self.object_type,
            size: self.size,
            modified_at: SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(self.modified_at_ms),
            object_id: self.object_id,
            resource_id: self.resource_id,
            signed_url: self.signed_url,
        }
    }
}

/// A single entry in a `list-files` response.
#[derive(Debug, Deserialize)]
pub struct ListEntryResponse {
    pub name: String,
    pub object_type: ObjectType,
    #[serde(default)]
    pub size: u64,
    pub modified_at_ms: u64,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
}

/// A directory entry as surfaced to the node engine: remote metadata plus
/// the user-visible name (suffix already applied for notebooks).
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub fuse_name: String,
    pub info: FileInfo,
}
