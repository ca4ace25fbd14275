//! Exponential-backoff retry wrapper for the signed-URL HTTP calls, per
//! §4.4 "Retry policy": base 1s, factor 2, at most 5 attempts, honoring a
//! `Retry-After` header when present. Non-transient failures (4xx other
//! than 429) are never retried.

use crate::error::{backoff_delay, MAX_RETRY_ATTEMPTS};
use reqwest::Response;
use std::time::Duration;
use tracing::warn;

/// Outcome of a single HTTP attempt, classified for the retry loop.
pub enum Attempt {
    Success(Response),
    Transient { retry_after: Option<Duration> },
    Permanent(reqwest::StatusCode),
}

pub fn classify(resp: Result<Response, reqwest::Error>) -> Attempt {
    match resp {
        Ok(r) => {
            let status = r.status();
            if status.is_success() {
                Attempt::Success(r)
            } else if status.as_u16() == 429 || status.is_server_error() {
                let retry_after = r
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Attempt::Transient { retry_after }
            } else {
                Attempt::Permanent(status)
            }
        }
        Err(_) => Attempt::Transient { retry_after: None },
    }
}

/// Runs `make_request` up to [`MAX_RETRY_ATTEMPTS`] times, sleeping on
/// transient failures with exponential backoff. Returns the last response
/// (success or not) once attempts are exhausted or a non-transient
/// outcome is observed.
pub async fn with_backoff<F, Fut>(label: &str, mut make_request: F) -> Result<Response, Attempt>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
{
    for attempt in 0..MAX_RETRY_ATTEMPTS {
        match classify(make_request().await) {
            Attempt::Success(r) => return Ok(r),
            Attempt::Permanent(status) => return Err(Attempt::Permanent(status)),
            Attempt::Transient { retry_after } => {
                if attempt + 1 == MAX_RETRY_ATTEMPTS {
                    warn!(label, attempt, "retries exhausted");
                    return Err(Attempt::Transient { retry_after });
                }
                let delay = backoff_delay(attempt, retry_after);
                warn!(label, attempt, delay_ms = delay.as_millis() as u64, "transient failure, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
    unreachable!("loop always returns within MAX_RETRY_ATTEMPTS iterations")
}
