use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::credentials::select_auth_method;
use super::expiry::{decode_expiry, Clock, SystemClock};
use super::session_client::{HttpSessionClient, SessionClient};
use super::store::CredentialStore;
use super::types::{AuthConfig, AuthMethod, CredentialState, SessionStatus, TokenPair};
use crate::error::{AuthError, Result};

/// Credential manager
/// Keeps session tokens valid with proactive refresh and a single renewal gate
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

struct Inner {
    /// Selected once at construction
    method: AuthMethod,

    /// Read-only configuration
    config: AuthConfig,

    /// Current credentials
    store: CredentialStore,

    /// Serializes login/refresh and the resulting store write
    gate: Arc<Mutex<()>>,

    /// Number of completed renewal attempts, bumped under the gate
    generation: AtomicU64,

    /// Failure of the most recent renewal attempt, if it failed
    last_failure: SyncMutex<Option<AuthError>>,

    /// Session endpoint
    client: Arc<dyn SessionClient>,

    clock: Arc<dyn Clock>,
}

/// Builder for `CredentialManager` with injectable collaborators
pub struct CredentialManagerBuilder {
    config: AuthConfig,
    client: Option<Arc<dyn SessionClient>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CredentialManagerBuilder {
    pub fn session_client(mut self, client: Arc<dyn SessionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Select the auth method and assemble the manager.
    /// Fails when neither session credentials nor a static token are usable.
    pub fn build(self) -> Result<CredentialManager> {
        let method = select_auth_method(&self.config)?;

        let client: Arc<dyn SessionClient> = match self.client {
            Some(client) => client,
            None => Arc::new(HttpSessionClient::new(
                &self.config.base_url,
                self.config.request_timeout,
            )?),
        };

        tracing::debug!(
            method = ?method,
            refresh_buffer_secs = self.config.refresh_buffer.as_secs(),
            "Credential manager initialized"
        );

        Ok(CredentialManager {
            inner: Arc::new(Inner {
                method,
                config: self.config,
                store: CredentialStore::new(),
                gate: Arc::new(Mutex::new(())),
                generation: AtomicU64::new(0),
                last_failure: SyncMutex::new(None),
                client,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            }),
        })
    }
}

impl CredentialManager {
    /// Create a manager talking to `config.base_url` over HTTP
    pub fn new(config: AuthConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: AuthConfig) -> CredentialManagerBuilder {
        CredentialManagerBuilder {
            config,
            client: None,
            clock: None,
        }
    }

    /// Make sure a usable access token is held, logging in or refreshing
    /// if needed. Call before every authenticated request.
    ///
    /// Valid tokens outside the refresh buffer return without I/O and
    /// without touching the renewal gate. Concurrent callers that need a
    /// renewal share one network call.
    pub async fn ensure_valid(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.method == AuthMethod::StaticToken {
            return Ok(());
        }

        // Fast path
        if inner.is_fresh(&inner.store.snapshot()) {
            return Ok(());
        }

        let observed = inner.generation.load(Ordering::Acquire);
        let guard = Arc::clone(&inner.gate).lock_owned().await;

        // Another caller may have renewed while we waited
        let current = inner.store.snapshot();
        if inner.is_fresh(&current) {
            tracing::debug!("Credentials renewed by a concurrent caller");
            return Ok(());
        }
        if inner.generation.load(Ordering::Acquire) != observed {
            let failure = inner.last_failure.lock().clone();
            if let Some(err) = failure {
                tracing::debug!(error = %err, "Concurrent renewal failed, sharing its outcome");
                return Err(err);
            }
            if current.authenticated {
                return Ok(());
            }
        }

        // The renewal runs detached so a caller giving up does not abort it
        // for the others waiting on the gate
        let task_inner = Arc::clone(inner);
        let task = tokio::spawn(async move {
            let _guard = guard;
            task_inner.renew(current).await
        });

        task.await
            .map_err(|e| AuthError::Internal(format!("credential renewal task failed: {}", e)))?
    }

    /// `Authorization` header for the configured method.
    /// Empty when session auth has no token yet.
    pub fn auth_header(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        match self.inner.method {
            AuthMethod::StaticToken => {
                if let Some(token) = &self.inner.config.static_token {
                    headers.insert("Authorization".to_string(), format!("Token {}", token));
                }
            }
            AuthMethod::SessionCredentials => {
                if let Some(token) = self.inner.store.snapshot().access_token {
                    if !token.is_empty() {
                        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
                    }
                }
            }
        }
        headers
    }

    /// Drop all held credentials so the next `ensure_valid()` logs in again.
    /// Use after the server authoritatively rejects the current token.
    pub fn invalidate(&self) {
        if self.inner.method == AuthMethod::StaticToken {
            return;
        }
        let had_token = self.inner.store.snapshot().authenticated;
        self.inner.store.clear();
        tracing::info!(had_access_token = had_token, "Credentials invalidated");
    }

    pub fn method(&self) -> AuthMethod {
        self.inner.method
    }

    pub fn status(&self) -> SessionStatus {
        match self.inner.method {
            AuthMethod::StaticToken => SessionStatus::Authenticated,
            AuthMethod::SessionCredentials => self
                .inner
                .store
                .snapshot()
                .status(self.inner.clock.now(), self.inner.config.refresh_buffer),
        }
    }

    /// Copy of the current credential state
    pub fn snapshot(&self) -> CredentialState {
        self.inner.store.snapshot()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner.store.snapshot().expires_at
    }
}

impl Inner {
    fn is_fresh(&self, state: &CredentialState) -> bool {
        state.is_fresh(self.clock.now(), self.config.refresh_buffer)
    }

    /// Runs with the gate held. Writes the store exactly once: the new
    /// state on success, a cleared state on failure.
    async fn renew(&self, current: CredentialState) -> Result<()> {
        let result = self.refresh_or_login(&current).await;

        match &result {
            Ok(state) => {
                tracing::info!(
                    has_access_token = state.authenticated,
                    expires_at = ?state.expires_at,
                    "Credentials updated"
                );
                self.store.replace(state.clone());
                *self.last_failure.lock() = None;
            }
            Err(err) => {
                tracing::error!(error = %err, "Authentication failed, clearing credentials");
                self.store.clear();
                *self.last_failure.lock() = Some(err.clone());
            }
        }
        self.generation.fetch_add(1, Ordering::Release);

        result.map(|_| ())
    }

    /// Refresh when a refresh token is held, fall back to a full login
    async fn refresh_or_login(&self, current: &CredentialState) -> Result<CredentialState> {
        if current.authenticated {
            if let Some(refresh_token) = current.refresh_token.as_deref() {
                tracing::debug!(expires_at = ?current.expires_at, "Access token expiring, refreshing");

                let refreshed = self
                    .client
                    .refresh(refresh_token)
                    .await
                    .and_then(|pair| self.state_from(pair))
                    .map_err(|e| AuthError::RefreshFailed(e.to_string()));

                match refreshed {
                    Ok(state) => return Ok(state),
                    Err(e) => tracing::warn!(error = %e, "Falling back to login"),
                }
            }
        }

        let (Some(username), Some(password)) = (
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        ) else {
            return Err(AuthError::Configuration(
                "session credentials are not configured".to_string(),
            ));
        };

        tracing::debug!(has_password = !password.is_empty(), "Performing login");
        let pair = self.client.login(username, password).await?;
        self.state_from(pair)
    }

    fn state_from(&self, pair: TokenPair) -> Result<CredentialState> {
        if pair.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "issued access token is empty".to_string(),
            ));
        }

        let expires_at = match decode_expiry(&pair.access_token) {
            Ok(exp) => Some(exp),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    access_token_len = pair.access_token.len(),
                    "Access token expiry unknown, treating as expiring"
                );
                None
            }
        };

        Ok(CredentialState::from_pair(pair, expires_at))
    }
}
