//! Error types for the remote client and node engine, and the mapping from
//! those errors to the `libc` errno values FUSE replies expect.
//!
//! The teacher crate (`fs/prelude.rs`) re-exports raw `libc` error constants
//! and matches on `Result<T, ()>`-shaped control flow at each call site.
//! Here the same constants back a typed error enum instead, translated at
//! the FUSE boundary with a single `to_errno` call per operation.

use std::time::Duration;

/// Errors surfaced by [`crate::remote::RemoteClient`].
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote object not found")]
    NotFound,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server error (status {0})")]
    Server(u16),
    #[error("request rejected (status {0})")]
    Rejected(u16),
    #[error("unrecognized response: {0}")]
    UnrecognizedResponse(String),
    #[error("operation timed out")]
    Timeout,
}

impl RemoteError {
    /// Transient per §4.4: HTTP 429/5xx or a connection-level failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Server(_) | RemoteError::Transport(_))
    }
}

/// Errors surfaced by node-engine operations, mapped 1:1 onto the FUSE
/// reply codes described in §4.6 "Error mapping".
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("no such entry")]
    NoEntry,
    #[error("i/o error: {0}")]
    Io(String),
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("operation not supported")]
    NotSupported,
    #[error("permission denied")]
    PermissionDenied,
    #[error("bad file descriptor")]
    BadFileDescriptor,
}

impl From<RemoteError> for NodeError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::NotFound => NodeError::NoEntry,
            other => NodeError::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(e.to_string())
    }
}

impl NodeError {
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            NodeError::NoEntry => libc::ENOENT,
            NodeError::Io(_) => libc::EIO,
            NodeError::NotADirectory => libc::ENOTDIR,
            NodeError::IsADirectory => libc::EISDIR,
            NodeError::InvalidArgument => libc::EINVAL,
            NodeError::NotSupported => libc::ENOTSUP,
            NodeError::PermissionDenied => libc::EACCES,
            NodeError::BadFileDescriptor => libc::EBADF,
        }
    }
}

/// Redacts a signed URL for logging: strips query string and fragment,
/// per §4.4/§7.
pub fn redact_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    match without_fragment.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => without_fragment.to_string(),
    }
}

/// Truncates a response body to 200 bytes for error-message logging, per §7.
pub fn truncate_body(body: &str) -> String {
    if body.len() <= 200 {
        body.to_string()
    } else {
        let mut end = 200;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...<truncated>", &body[..end])
    }
}

/// Backoff schedule used by the retry policy in §4.4: base 1s, factor 2,
/// at most 5 attempts, honoring `Retry-After` when present.
pub fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(d) = retry_after {
        return d;
    }
    let base_ms = 1000u64;
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

pub const MAX_RETRY_ATTEMPTS: u32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_query_and_fragment() {
        assert_eq!(
            redact_url("https://x.example/signed?sig=abc&exp=1#frag"),
            "https://x.example/signed?<redacted>"
        );
        assert_eq!(redact_url("https://x.example/plain"), "https://x.example/plain");
    }

    #[test]
    fn truncates_long_bodies() {
        let long = "a".repeat(500);
        let truncated = truncate_body(&long);
        assert!(truncated.starts_with(&"a".repeat(200)));
        assert!(truncated.ends_with("...<truncated>"));
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        assert_eq!(backoff_delay(0, None), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1, None), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2, None), Duration::from_millis(4000));
    }

    #[test]
    fn retry_after_overrides_backoff() {
        assert_eq!(
            backoff_delay(3, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
    }
}
