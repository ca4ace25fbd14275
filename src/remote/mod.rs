//! The remote-access client (§4.4): stat/list/read/write/delete/mkdir/
//! rename against the remote workspace API, with size-adaptive transfer,
//! retry/backoff, and notebook-vs-file typing.

pub mod retry;
pub mod transfer;
pub mod types;

use crate::cache::metadata::MetadataCache;
use crate::error::RemoteError;
use crate::path::PathTranslator;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;
use types::{DirEntry, FileInfo, ListEntryResponse, ObjectInfoResponse, ObjectType};

/// Default per-HTTP-call timeout (§4.4).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

pub struct RemoteClient {
    http: Client,
    base_url: String,
    token: String,
    metadata_cache: MetadataCache,
    path_translator: PathTranslator,
}

impl RemoteClient {
    pub fn new(base_url: String, token: String, metadata_cache: MetadataCache) -> Self {
        let http = Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .expect("reqwest client builder should not fail with default TLS backend");
        Self {
            http,
            base_url,
            token,
            metadata_cache,
            path_translator: PathTranslator::new(),
        }
    }

    async fn fetch_object_info(&self, remote_path: &str) -> Result<FileInfo, RemoteError> {
        let url = format!("{}/api/2.0/workspace/get-status", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("path", remote_path)])
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(RemoteError::NotFound);
        }
        if !status.is_success() {
            return Err(RemoteError::Server(status.as_u16()));
        }
        let parsed: ObjectInfoResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::UnrecognizedResponse(e.to_string()))?;
        Ok(parsed.into_file_info())
    }

    /// §4.4 `stat`: consults the metadata cache first; on miss, calls
    /// `object-info`. Honors the notebook-suffix fallback: a `.ipynb`
    /// lookup first tries the base (suffixless) remote path.
    pub async fn stat(&self, fuse_path: &str) -> Result<FileInfo, RemoteError> {
        let remote_path = self.path_translator.to_remote(fuse_path);

        let (cached, _hit) = self.metadata_cache.get(&remote_path);
        if let Some(entry) = cached {
            return entry.ok_or(RemoteError::NotFound);
        }

        let result = self.fetch_object_info(&remote_path).await;
        match &result {
            Ok(info) => self.metadata_cache.set(&remote_path, Some(info.clone())),
            Err(RemoteError::NotFound) => self.metadata_cache.set(&remote_path, None),
            Err(_) => {}
        }

        if self.path_translator.has_notebook_suffix(fuse_path) {
            match result {
                Ok(info) if info.is_notebook() => Ok(info),
                _ => Err(RemoteError::NotFound),
            }
        } else {
            result
        }
    }

    /// §4.4 `read_dir`: lists, sorts lexicographically, and seeds the
    /// metadata cache with every returned entry.
    pub async fn read_dir(&self, fuse_path: &str) -> Result<Vec<DirEntry>, RemoteError> {
        let remote_path = self.path_translator.to_remote(fuse_path);
        let url = format!("{}/api/2.0/workspace/list", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("path", remote_path.as_str())])
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(RemoteError::NotFound);
        }
        if !status.is_success() {
            return Err(RemoteError::Server(status.as_u16()));
        }
        let mut raw: Vec<ListEntryResponse> = resp
            .json()
            .await
            .map_err(|e| RemoteError::UnrecognizedResponse(e.to_string()))?;
        raw.sort_by(|a, b| a.name.cmp(&b.name));

        let mut entries = Vec::with_capacity(raw.len());
        for e in raw {
            let child_remote = if remote_path.is_empty() {
                e.name.clone()
            } else {
                format!("{remote_path}/{}", e.name)
            };
            let info = FileInfo {
                remote_path: child_remote.clone(),
                object_type: e.object_type,
                size: e.size,
                modified_at: std::time::SystemTime::UNIX_EPOCH
                    + Duration::from_millis(e.modified_at_ms),
                object_id: e.object_id,
                resource_id: e.resource_id,
                signed_url: None,
            };
            self.metadata_cache.set(&child_remote, Some(info.clone()));
            let fuse_name = self
                .path_translator
                .to_fuse_name(&e.name, info.is_notebook());
            entries.push(DirEntry { fuse_name, info });
        }
        Ok(entries)
    }

    /// §4.4 `read_all`: selects transport by object type and size.
    pub async fn read_all(&self, info: &FileInfo) -> Result<Bytes, RemoteError> {
        if info.is_notebook() {
            return transfer::export(&self.http, &self.base_url, &self.token, &info.remote_path, true).await;
        }

        if info.size >= transfer::LARGE_FILE_THRESHOLD {
            if let Some(descriptor) = &info.signed_url {
                match transfer::signed_get(&self.http, descriptor).await {
                    Ok(bytes) => return Ok(bytes),
                    Err(e) => {
                        warn!(error = %e, "signed GET failed, falling back to export");
                    }
                }
            }
        }
        transfer::export(&self.http, &self.base_url, &self.token, &info.remote_path, false).await
    }

    /// §4.4 `write`: selects transport by object type and size; invalidates
    /// the metadata cache for the written path up front.
    pub async fn write(&self, fuse_path: &str, object_type: ObjectType, bytes: Bytes) -> Result<(), RemoteError> {
        let remote_path = self.path_translator.to_remote(fuse_path);
        self.metadata_cache.invalidate(&remote_path);

        if object_type == ObjectType::Notebook {
            return self.write_notebook(fuse_path, bytes).await;
        }

        if bytes.len() as u64 >= transfer::LARGE_FILE_THRESHOLD {
            match transfer::request_upload_url(&self.http, &self.base_url, &self.token, &remote_path, bytes.len() as u64).await {
                Ok(descriptor) => match transfer::signed_put(&self.http, &descriptor, bytes.clone()).await {
                    Ok(()) => return Ok(()),
                    Err(e) => warn!(error = %e, "signed PUT failed, falling back to import-file"),
                },
                Err(e) => warn!(error = %e, "signed-url request failed, falling back to import-file"),
            }
        }
        transfer::import_file(&self.http, &self.base_url, &self.token, &remote_path, bytes).await
    }

    /// §4.4 `write_notebook`: dedicated Jupyter-format import, regardless
    /// of size (the transfer table treats small/large notebook writes
    /// identically).
    pub async fn write_notebook(&self, fuse_path: &str, bytes: Bytes) -> Result<(), RemoteError> {
        let remote_path = self.path_translator.to_remote(fuse_path);
        self.metadata_cache.invalidate(&remote_path);
        transfer::import_notebook(&self.http, &self.base_url, &self.token, &remote_path, bytes).await
    }

    pub async fn mkdir(&self, fuse_path: &str) -> Result<(), RemoteError> {
        let remote_path = self.path_translator.to_remote(fuse_path);
        self.metadata_cache.invalidate(&remote_path);
        let url = format!("{}/api/2.0/workspace/mkdirs", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "path": remote_path }))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteError::Server(status.as_u16()))
        }
    }

    pub async fn delete(&self, fuse_path: &str, recursive: bool) -> Result<(), RemoteError> {
        let remote_path = self.path_translator.to_remote(fuse_path);
        self.metadata_cache.invalidate(&remote_path);
        let url = format!("{}/api/2.0/workspace/delete", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "path": remote_path, "recursive": recursive }))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else if status.as_u16() == 404 {
            Err(RemoteError::NotFound)
        } else {
            Err(RemoteError::Server(status.as_u16()))
        }
    }

    pub async fn rename(&self, old_fuse_path: &str, new_fuse_path: &str) -> Result<(), RemoteError> {
        let old_remote = self.path_translator.to_remote(old_fuse_path);
        let new_remote = self.path_translator.to_remote(new_fuse_path);
        self.metadata_cache.invalidate(&old_remote);
        self.metadata_cache.invalidate(&new_remote);
        let url = format!("{}/api/2.0/workspace/rename", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "source_path": old_remote, "destination_path": new_remote }))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteError::Server(status.as_u16()))
        }
    }

    pub fn path_translator(&self) -> &PathTranslator {
        &self.path_translator
    }

    pub fn metadata_cache(&self) -> &MetadataCache {
        &self.metadata_cache
    }
}
