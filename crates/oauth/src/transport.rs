//! The narrow HTTP seam between the flow logic and the network.
//!
//! Exchanger and refresher only ever build a [`TokenRequest`] and read back an
//! [`HttpResponse`]; anything implementing [`HttpTransport`] can stand in for
//! the provider.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    rand::Rng,
    tracing::{debug, warn},
};

use crate::error::{OAuthError, TransportError};

/// Bound on every outbound call; the provider's latency is outside our control.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// A form-encoded POST to the token endpoint.
#[derive(Clone)]
pub struct TokenRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl TokenRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: vec![
                (
                    "Content-Type".into(),
                    "application/x-www-form-urlencoded".into(),
                ),
                ("Accept".into(), "application/json".into()),
            ],
            form: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `grant_type` form field, handy for log fields.
    pub fn grant_type(&self) -> &str {
        self.form_value("grant_type").unwrap_or("unknown")
    }
}

// Form values and headers carry secrets, so only the shape is printed.
impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.form.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("TokenRequest")
            .field("url", &self.url)
            .field("form_keys", &keys)
            .finish_non_exhaustive()
    }
}

/// Status and raw body of whatever the provider answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one token request. Any HTTP response, whatever its status, is `Ok`;
/// `Err` is reserved for failing to get a response at all.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TokenRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: TokenRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    async fn send(&self, request: TokenRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

// ── reqwest ─────────────────────────────────────────────────────────────────

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("authcode/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OAuthError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TokenRequest) -> Result<HttpResponse, TransportError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&request.form)
            .finish();

        // Headers come from the request, `Content-Type` included, so the body
        // is set raw rather than through `RequestBuilder::form`.
        let mut builder = self.client.post(&request.url).body(body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }
}

// ── retry ───────────────────────────────────────────────────────────────────

/// Bounded retry for transport failures only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retrying.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }

    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::none()
        }
    }

    /// Upper bound of the sleep before retry number `retry` (0-based):
    /// `base_delay * 2^retry`, capped at `max_delay`.
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.min(16)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Full jitter: uniform in `[0, backoff_ceiling(retry)]`.
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let ceiling = self.backoff_ceiling(retry).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ceiling))
    }
}

/// Wraps another transport and re-sends on [`TransportError`].
///
/// HTTP responses are passed through untouched whatever their status, so a
/// rejected grant is never replayed.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for RetryingTransport<T> {
    async fn send(&self, request: TokenRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt = 1;
        loop {
            match self.inner.send(request.clone()).await {
                Ok(resp) => return Ok(resp),
                Err(err) if attempt < self.policy.max_attempts => {
                    let delay = self.policy.jittered_delay(attempt - 1);
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "token request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(err) => {
                    debug!(attempt, error = %err, "token request failed, giving up");
                    return Err(err);
                },
            }
        }
    }
}
