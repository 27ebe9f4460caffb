// Blocking HTTP plumbing shared by the hosted service clients
// Handles JSON encoding, retries with exponential backoff and status classification


use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::{RagError, Result};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const DEFAULT_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    timeout: Duration,
    retry_attempts: u32,
    backoff: Duration,
}

impl HttpClient {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            timeout,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Base delay before the first retry; later retries double it
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// GET `url` and decode the JSON body
    #[inline]
    pub fn get_json<T: DeserializeOwned>(&self, url: &Url, headers: &[(&str, &str)]) -> Result<T> {
        debug!("GET {}", url);

        let response_text = self.make_request_with_retry(url, || {
            let mut request = self.agent.get(url.as_str());
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        decode_body(url, &response_text)
    }

    /// POST `body` as JSON to `url` and decode the JSON response
    #[inline]
    pub fn post_json<B, T>(&self, url: &Url, headers: &[(&str, &str)], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {}", url);

        let request_json = serde_json::to_string(body).map_err(|e| {
            RagError::Validation(format!("Failed to serialize request for {}: {}", url, e))
        })?;

        let response_text = self.make_request_with_retry(url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        decode_body(url, &response_text)
    }

    fn make_request_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if is_retryable_status(*status) {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(status_error(*status, url));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(RagError::RemoteUnavailable(format!(
                            "Request to {} failed: {}",
                            url, error
                        )));
                    }

                    last_error = Some(match error {
                        ureq::Error::StatusCode(status) => status_error(status, url),
                        other => RagError::RemoteUnavailable(format!(
                            "Request to {} failed: {}",
                            url, other
                        )),
                    });

                    if attempt < self.retry_attempts {
                        let delay = backoff_delay(self.backoff, attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", url);

        Err(last_error.unwrap_or_else(|| {
            RagError::RemoteUnavailable(format!("Request to {} failed after retries", url))
        }))
    }
}

/// Delay before the retry that follows `attempt`, saturating instead of overflowing
fn backoff_delay(backoff: Duration, attempt: u32) -> Duration {
    let factor = EXPONENTIAL_BACKOFF_BASE
        .checked_pow(attempt.saturating_sub(1))
        .and_then(|f| u32::try_from(f).ok())
        .unwrap_or(u32::MAX);
    backoff.saturating_mul(factor)
}

/// Resolve `path` relative to `base`, treating `base` as a directory
#[inline]
pub fn join_endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| RagError::Config(format!("Invalid endpoint {} for {}: {}", path, base, e)))
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn decode_body<T: DeserializeOwned>(url: &Url, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        RagError::RemoteUnavailable(format!("Malformed response from {}: {}", url, e))
    })
}

#[inline]
fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Map an HTTP status to the error kind callers branch on
#[inline]
pub fn status_error(status: u16, url: &Url) -> RagError {
    match status {
        400 | 422 => RagError::Validation(format!("{} rejected the request (HTTP {})", url, status)),
        404 => RagError::NotFound(format!("{} returned HTTP 404", url)),
        401 | 403 => RagError::RemoteUnavailable(format!(
            "{} refused the credentials (HTTP {})",
            url, status
        )),
        _ => RagError::RemoteUnavailable(format!("{} returned HTTP {}", url, status)),
    }
}
