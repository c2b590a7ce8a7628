//! HTTP POST with per-attempt timeout and exponential backoff.
//!
//! Only network errors, timeouts, and statuses on the policy's allow-list are
//! retried. Any other non-success status fails the call on the spot.

use std::time::Duration;

use codeguardian_core::{GuardianError, RetryConfig};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::Serialize;

/// Backoff schedule and retryable status allow-list.
///
/// # Examples
///
/// ```
/// use codeguardian_review::client::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
/// assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
/// assert_eq!(policy.delay_for(10), Duration::from_millis(10_000));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts for a plain call.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Growth factor between delays.
    pub multiplier: f64,
    /// Statuses that count as transient.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Build a policy from the `[retry]` configuration section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
            retryable_statuses: config.retryable_statuses.clone(),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `initial * multiplier^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// The delays slept between `attempts` consecutive failures.
    pub fn schedule(&self, attempts: u32) -> Vec<Duration> {
        (1..attempts).map(|a| self.delay_for(a)).collect()
    }

    /// `true` if `status` is on the allow-list.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// Failure of a single HTTP call, possibly after several attempts.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The attempt did not complete within the timeout.
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Connection or protocol failure.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// Every attempt failed with a transient error.
    #[error("failed after {attempts} attempts; last error: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The final failure.
        last: Box<RequestError>,
    },
}

impl RequestError {
    /// The HTTP status carried by this error or its last attempt, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

impl From<RequestError> for GuardianError {
    fn from(err: RequestError) -> Self {
        GuardianError::Provider(err.to_string())
    }
}

/// A `reqwest` client that applies a [`RetryPolicy`] to every POST.
///
/// # Examples
///
/// ```
/// use codeguardian_review::client::{HttpClient, RetryPolicy};
/// use std::time::Duration;
///
/// let client = HttpClient::new(RetryPolicy::default(), Duration::from_secs(60)).unwrap();
/// assert_eq!(client.policy().max_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    policy: RetryPolicy,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client with the given policy and per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::Config`] if the HTTP client cannot be built.
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Result<Self, GuardianError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("codeguardian/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GuardianError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            policy,
            timeout,
        })
    }

    /// The retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POST `body` as JSON to `url`, retrying transient failures up to
    /// `max_attempts` times in total.
    ///
    /// Returns the response on the first 2xx status.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Status`] immediately for a status outside the
    ///   allow-list.
    /// - [`RequestError::Exhausted`] once every attempt has failed
    ///   transiently.
    /// - [`RequestError::Encode`] if `body` cannot be serialized.
    pub async fn post_json<T>(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &T,
        max_attempts: u32,
    ) -> Result<reqwest::Response, RequestError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)?;
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.send_once(url, headers, &payload).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !self.is_transient(&err) {
                tracing::debug!(attempt, error = %err, "non-retryable failure");
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(RequestError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn send_once(
        &self,
        url: &str,
        headers: &HeaderMap,
        payload: &[u8],
    ) -> Result<reqwest::Response, RequestError> {
        let response = self
            .client
            .post(url)
            .headers(headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RequestError::Timeout(self.timeout)
                } else {
                    RequestError::Transport(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RequestError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn is_transient(&self, err: &RequestError) -> bool {
        match err {
            RequestError::Status { status, .. } => self.policy.is_retryable_status(*status),
            RequestError::Timeout(_) | RequestError::Transport(_) => true,
            RequestError::Encode(_) | RequestError::Exhausted { .. } => false,
        }
    }
}
