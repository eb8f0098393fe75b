//! HTTP retry helpers for transient errors.
//!
//! Every request the Carto backend makes goes through [`send_json`] or
//! [`send_text`], which retry connection failures, timeouts, HTTP 429,
//! and HTTP 5xx with exponential backoff. Other 4xx responses are
//! permanent: Carto answers a malformed filter with HTTP 400, and
//! retrying would only resubmit the same bad query.

use std::time::Duration;

use crate::BackendError;

/// Maximum number of retries after the first attempt (500ms, 1s, 2s).
const MAX_RETRIES: u32 = 3;

/// Base delay of the exponential backoff.
const BASE_DELAY: Duration = Duration::from_millis(500);

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends a request and parses the response body as JSON.
///
/// `build_request` is called once per attempt since builders are
/// consumed by `.send()`.
///
/// # Errors
///
/// Returns [`BackendError`] if the request still fails after all
/// retries, the server answers with a non-retryable status, or the body
/// is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, BackendError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let text = send_text(build_request).await?;
    serde_json::from_str(&text).map_err(|e| BackendError::Response {
        message: format!("JSON parse failed: {e} (body: {})", preview(&text)),
    })
}

/// Sends a request and returns the response body as text.
///
/// # Errors
///
/// Returns [`BackendError`] if the request still fails after all
/// retries or the server answers with a non-retryable status.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F) -> Result<String, BackendError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES).await?;
    Ok(response.text().await?)
}

/// Core retry loop shared by [`send_json`] and [`send_text`].
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, BackendError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }
        let can_retry = attempt < max_retries;
        attempt += 1;

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if can_retry && is_transient(&e) => {
                log::warn!("  transient error: {e}");
                continue;
            }
            Err(e) => return Err(BackendError::Http(e)),
        };

        let status = response.status();
        let retryable =
            status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

        if retryable && can_retry {
            log::warn!("  HTTP {status}");
            continue;
        }

        if retryable || status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Response {
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        return Ok(response);
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff(attempt: u32) -> Duration {
    BASE_DELAY * (1u32 << (attempt - 1).min(16))
}

fn preview(text: &str) -> String {
    if text.len() > BODY_PREVIEW_LEN {
        let mut end = BODY_PREVIEW_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
