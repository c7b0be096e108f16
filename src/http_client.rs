use anyhow::Context;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Request, Response};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::CredentialManager;
use crate::error::{ApiError, AuthError};

/// HTTP client that authenticates every request through a `CredentialManager`
pub struct AuthenticatedHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Credential manager
    credentials: Arc<CredentialManager>,

    /// Base URL that relative paths are joined to
    base_url: String,

    /// Maximum number of retries
    max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    base_delay_ms: u64,
}

impl AuthenticatedHttpClient {
    /// Create a new HTTP client
    pub fn new(
        credentials: Arc<CredentialManager>,
        base_url: &str,
        connect_timeout: u64,
        request_timeout: u64,
        max_retries: u32,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            base_delay_ms: 1000, // 1 second base delay
        })
    }

    /// Override the backoff base delay
    pub fn with_base_delay(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// GET a path relative to the base URL
    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let request = self
            .client
            .get(&url)
            .build()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid request: {}", e.without_url())))?;
        self.execute(request).await
    }

    /// Execute a request with credentials and retry logic
    /// Automatically handles:
    /// - retryable credential errors: exponential backoff around `ensure_valid()`
    /// - 401/403: invalidates credentials once, re-authenticates and retries
    /// - 429 and 5xx: exponential backoff
    /// - network errors: exponential backoff
    pub async fn execute(&self, request: Request) -> Result<Response, ApiError> {
        let mut attempt = 0;
        let mut invalidated = false;

        let method = request.method().clone();
        let path = request.url().path().to_string();
        tracing::debug!(method = %method, path = %path, "Sending HTTP request");

        loop {
            if let Err(e) = self.credentials.ensure_valid().await {
                if e.is_retryable() && attempt < self.max_retries {
                    let delay = self.calculate_backoff_delay(attempt);
                    tracing::warn!(
                        error = %e,
                        delay_ms = delay,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        "Could not obtain credentials, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                    continue;
                }
                return Err(ApiError::Auth(e));
            }

            let mut req = request.try_clone().ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!("Request body is not cloneable"))
            })?;
            self.apply_auth_header(&mut req)?;

            tracing::debug!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                "Executing request attempt"
            );

            match self.client.execute(req).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        tracing::debug!(status = %status, "Request successful");
                        return Ok(response);
                    }

                    match status.as_u16() {
                        // Token rejected despite the proactive check (clock skew, revocation)
                        401 | 403 if !invalidated => {
                            tracing::warn!(
                                status = status.as_u16(),
                                "Credentials rejected, re-authenticating"
                            );
                            self.credentials.invalidate();
                            invalidated = true;
                            continue;
                        }

                        429 | 500..=599 if attempt < self.max_retries => {
                            let delay = self.calculate_backoff_delay(attempt);
                            tracing::warn!(
                                "Received {}, retrying after {}ms (attempt {}/{})",
                                status,
                                delay,
                                attempt + 1,
                                self.max_retries
                            );
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            attempt += 1;
                            continue;
                        }

                        _ => {}
                    }

                    let message = response.text().await.unwrap_or_default();
                    tracing::error!(
                        status = status.as_u16(),
                        path = %path,
                        attempt = attempt + 1,
                        body_len = message.len(),
                        "HTTP request failed with error response"
                    );
                    return Err(ApiError::Upstream {
                        status: status.as_u16(),
                        message,
                    });
                }

                Err(e) => {
                    let e = e.without_url();
                    let error_kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connection_failed"
                    } else if e.is_request() {
                        "request_error"
                    } else if e.is_body() {
                        "body_error"
                    } else {
                        "unknown"
                    };

                    if attempt < self.max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            error_kind,
                            error = %e,
                            path = %path,
                            attempt = attempt + 1,
                            delay_ms = delay,
                            "HTTP request error, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        error_kind,
                        error = %e,
                        path = %path,
                        total_attempts = attempt + 1,
                        "HTTP request failed after all retries"
                    );
                    return Err(ApiError::Transport(format!("{} (kind: {})", e, error_kind)));
                }
            }
        }
    }

    fn apply_auth_header(&self, request: &mut Request) -> Result<(), ApiError> {
        for (name, value) in self.credentials.auth_header() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::Internal(anyhow::anyhow!("Invalid header name")))?;
            let mut value = HeaderValue::from_str(&value).map_err(|_| {
                ApiError::Auth(AuthError::MalformedToken(
                    "token contains characters not allowed in a header".to_string(),
                ))
            })?;
            value.set_sensitive(true);
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }

    /// Calculate exponential backoff delay
    fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        // Exponential backoff: base_delay * 2^attempt
        // With jitter to avoid thundering herd
        let delay = self.base_delay_ms * 2_u64.pow(attempt);
        let jitter = (delay as f64 * 0.1 * rand::random::<f64>()) as u64;
        delay + jitter
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
