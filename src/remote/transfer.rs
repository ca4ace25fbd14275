//! Size-adaptive transfer strategy, per §4.4's transfer table: small
//! payloads move through the direct import/export endpoints, large
//! payloads through a signed-URL GET/PUT with a fallback to the direct
//! endpoints when the signed transfer fails after retries.

use super::retry::{with_backoff, Attempt};
use super::types::{SignedUrlDescriptor, SignedUrlResponse};
use crate::error::{redact_url, truncate_body, RemoteError};
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use tracing::warn;

/// Threshold separating "small" from "large" transfers, per §4.4.
pub const LARGE_FILE_THRESHOLD: u64 = 5 * 1024 * 1024;

async fn body_or_server_error(resp: reqwest::Response) -> Result<Bytes, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        resp.bytes().await.map_err(|e| RemoteError::Transport(e.to_string()))
    } else if status.as_u16() == 404 {
        Err(RemoteError::NotFound)
    } else {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %truncate_body(&body), "remote export failed");
        Err(RemoteError::Server(status.as_u16()))
    }
}

/// `export` endpoint, base64 body, for regular files and — with
/// `jupyter = true` — for notebooks.
pub async fn export(
    http: &Client,
    base_url: &str,
    token: &str,
    remote_path: &str,
    jupyter: bool,
) -> Result<Bytes, RemoteError> {
    let format = if jupyter { "JUPYTER" } else { "SOURCE" };
    let url = format!("{base_url}/api/2.0/workspace-files/export");
    let resp = http
        .get(&url)
        .bearer_auth(token)
        .query(&[("path", remote_path), ("format", format)])
        .send()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;

    let raw = body_or_server_error(resp).await?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&raw)
        .map_err(|e| RemoteError::UnrecognizedResponse(e.to_string()))?;
    Ok(Bytes::from(decoded))
}

/// Signed-URL GET for large files, with exponential-backoff retry. Falls
/// back to [`export`] on exhausted retries or a permanent error, per §4.4.
pub async fn signed_get(
    http: &Client,
    descriptor: &SignedUrlDescriptor,
) -> Result<Bytes, RemoteError> {
    let redacted = redact_url(&descriptor.url);
    let result = with_backoff(&format!("signed_get {redacted}"), || {
        let mut req = http.get(&descriptor.url);
        for (k, v) in &descriptor.headers {
            req = req.header(k, v);
        }
        req.send()
    })
    .await;

    match result {
        Ok(resp) => body_or_server_error(resp).await,
        Err(Attempt::Permanent(status)) => Err(RemoteError::Rejected(status.as_u16())),
        Err(Attempt::Transient { .. }) => Err(RemoteError::Server(0)),
        Err(Attempt::Success(_)) => unreachable!(),
    }
}

/// `import-file` endpoint: binary body POST, for regular files.
pub async fn import_file(
    http: &Client,
    base_url: &str,
    token: &str,
    remote_path: &str,
    bytes: Bytes,
) -> Result<(), RemoteError> {
    let url = format!("{base_url}/api/2.0/workspace-files/import-file");
    let resp = http
        .post(&url)
        .bearer_auth(token)
        .query(&[("path", remote_path)])
        .body(bytes)
        .send()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %truncate_body(&body), "import-file failed");
        Err(RemoteError::Server(status.as_u16()))
    }
}

/// Dedicated notebook `import`: Jupyter-format JSON body.
pub async fn import_notebook(
    http: &Client,
    base_url: &str,
    token: &str,
    remote_path: &str,
    bytes: Bytes,
) -> Result<(), RemoteError> {
    let url = format!("{base_url}/api/2.0/workspace/import");
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let resp = http
        .post(&url)
        .bearer_auth(token)
        .json(&serde_json::json!({
            "path": remote_path,
            "format": "JUPYTER",
            "content": encoded,
            "overwrite": true,
        }))
        .send()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %truncate_body(&body), "notebook import failed");
        Err(RemoteError::Server(status.as_u16()))
    }
}

/// Requests a signed upload URL (or list of them — §9 Open Questions) for
/// a large write, then PUTs the payload with retry, falling back to
/// [`import_file`] on exhaustion.
pub async fn request_upload_url(
    http: &Client,
    base_url: &str,
    token: &str,
    remote_path: &str,
    size: u64,
) -> Result<SignedUrlDescriptor, RemoteError> {
    let url = format!("{base_url}/api/2.0/workspace-files/new-files");
    let resp = http
        .post(&url)
        .bearer_auth(token)
        .json(&serde_json::json!({ "path": remote_path, "size": size }))
        .send()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(RemoteError::Server(status.as_u16()));
    }
    let parsed: SignedUrlResponse = resp
        .json()
        .await
        .map_err(|e| RemoteError::UnrecognizedResponse(e.to_string()))?;
    parsed
        .first()
        .ok_or_else(|| RemoteError::UnrecognizedResponse("empty signed-url response".into()))
}

pub async fn signed_put(
    http: &Client,
    descriptor: &SignedUrlDescriptor,
    bytes: Bytes,
) -> Result<(), RemoteError> {
    let redacted = redact_url(&descriptor.url);
    let result = with_backoff(&format!("signed_put {redacted}"), || {
        let mut req = http.put(&descriptor.url);
        for (k, v) in &descriptor.headers {
            req = req.header(k, v);
        }
        req.body(bytes.clone()).send()
    })
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(Attempt::Permanent(status)) => Err(RemoteError::Rejected(status.as_u16())),
        Err(Attempt::Transient { .. }) => Err(RemoteError::Server(0)),
        Err(Attempt::Success(_)) => unreachable!(),
    }
}
