//! HTTP retry helpers for transient errors.
//!
//! Every client in this crate goes through [`send_json`] or [`send_text`]
//! instead of calling `reqwest::RequestBuilder::send()` directly, so each
//! request gets exponential backoff on connection failures, timeouts,
//! HTTP 429 and HTTP 5xx.
//!
//! ```ignore
//! let body = retry::send_json(RetryPolicy::FEED, || client.get(&url).query(&params)).await?;
//! ```

use std::time::Duration;

use crate::FeedError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// How hard to retry one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Connection-level retries (errors, 429, 5xx).
    pub max_retries: u32,
    /// Full re-fetches when the body arrives but cannot be decoded.
    pub max_body_retries: u32,
    /// Delay before the first retry; doubles on every further attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Context feeds sit behind a short fan-out timeout, so they give up
    /// quickly.
    pub const FEED: Self = Self {
        max_retries: 2,
        max_body_retries: 1,
        base_delay: Duration::from_millis(500),
    };

    /// Geocoding and raster calls gate the whole analysis and may wait
    /// longer.
    pub const PATIENT: Self = Self {
        max_retries: 5,
        max_body_retries: 3,
        base_delay: Duration::from_secs(1),
    };

    /// A single attempt, for callers that fail over on their own.
    pub const ONCE: Self = Self {
        max_retries: 0,
        max_body_retries: 0,
        base_delay: Duration::from_secs(0),
    };

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::FEED
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// `build_request` is called on every attempt since builders are
/// consumed by `.send()`. A body that arrives but does not parse is
/// re-fetched up to `policy.max_body_retries` times, each attempt going
/// through the connection-level retry loop again. HTTP 4xx other than
/// 429 is never retried.
///
/// # Errors
///
/// Returns [`FeedError`] if the request fails after all retries, the
/// server returns a non-retryable status code, or the body cannot be
/// parsed as JSON after all body retries.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    policy: RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, FeedError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;
    loop {
        let response = send_inner(&build_request, policy).await?;

        let url = response.url().to_string();
        let status = response.status();
        let content_type = header(&response, reqwest::header::CONTENT_TYPE);

        let error = match response.text().await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => return Ok(value),
                Err(json_err) => {
                    log::warn!(
                        "JSON parse failed\n  \
                         url: {url}\n  \
                         status: {status}\n  \
                         content-type: {content_type:?}\n  \
                         received: {} bytes\n  \
                         parse error: {json_err}\n  \
                         body preview: {}",
                        text.len(),
                        preview(&text),
                    );
                    FeedError::Parse {
                        message: format!(
                            "JSON parse failed: {json_err} (status={status}, \
                             received {} bytes, content-type={content_type:?})",
                            text.len()
                        ),
                    }
                }
            },
            Err(e) => {
                log::warn!(
                    "Response body read failed\n  \
                     url: {url}\n  \
                     status: {status}\n  \
                     error: {e}"
                );
                FeedError::Http(e)
            }
        };

        if body_attempt >= policy.max_body_retries {
            return Err(error);
        }
        body_attempt += 1;
        let delay = policy.delay(body_attempt);
        log::warn!(
            "  body retry {body_attempt}/{} in {delay:?}...",
            policy.max_body_retries
        );
        tokio::time::sleep(delay).await;
    }
}

/// Sends an HTTP request and returns the response body as a `String`.
///
/// # Errors
///
/// Returns [`FeedError`] if the request fails after all retries or the
/// body cannot be read after all body retries.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(policy: RetryPolicy, build_request: F) -> Result<String, FeedError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;
    loop {
        let response = send_inner(&build_request, policy).await?;
        let url = response.url().to_string();

        match response.text().await {
            Ok(text) => return Ok(text),
            Err(e) => {
                if body_attempt >= policy.max_body_retries {
                    log::error!("Text body read failed, giving up.\n  url: {url}\n  error: {e}");
                    return Err(FeedError::Http(e));
                }
                body_attempt += 1;
                let delay = policy.delay(body_attempt);
                log::warn!(
                    "Text body read failed (body retry {body_attempt}/{}), \
                     re-fetching in {delay:?}...\n  url: {url}\n  error: {e}",
                    policy.max_body_retries
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Core retry loop shared by [`send_json`] and [`send_text`].
///
/// Returns the first response with a 2xx or 3xx status.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    policy: RetryPolicy,
) -> Result<reqwest::Response, FeedError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(FeedError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status}");
                        attempt += 1;
                        continue;
                    }
                    return Err(FeedError::Status {
                        status: status.as_u16(),
                        url: response.url().to_string(),
                    });
                }

                if status.is_client_error() {
                    return Err(FeedError::Status {
                        status: status.as_u16(),
                        url: response.url().to_string(),
                    });
                }

                return Ok(response);
            }
        }
    }
}

fn header(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

/// First [`BODY_PREVIEW_LEN`] bytes of `text`, cut on a char boundary.
fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
