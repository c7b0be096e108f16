// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default margin before expiry at which a proactive refresh is triggered
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Authentication mechanism, selected once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Username/password login against the session endpoint,
    /// sends `Authorization: Bearer <access_token>`
    SessionCredentials,

    /// Pre-issued token, sends `Authorization: Token <static_token>`
    StaticToken,
}

/// Lifecycle state as observed from one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticated,
    /// Authenticated but within the refresh buffer, or expiry unknown
    ExpiringSoon,
}

/// Read-only configuration consumed at construction
#[derive(Clone)]
pub struct AuthConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub static_token: Option<String>,
    pub refresh_buffer: Duration,
    pub request_timeout: Duration,
}

impl AuthConfig {
    /// Session-credential configuration with default buffer and timeout
    pub fn with_credentials(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: Some(username.into()),
            password: Some(password.into()),
            static_token: None,
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Static-token configuration
    pub fn with_static_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            static_token: Some(token.into()),
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .field("has_static_token", &self.static_token.is_some())
            .field("refresh_buffer", &self.refresh_buffer)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Access and refresh token issued together.
/// Always replaced as a unit, never field by field.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    #[serde(alias = "access")]
    pub access_token: String,
    #[serde(alias = "refresh")]
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token_len", &self.access_token.len())
            .field("refresh_token_len", &self.refresh_token.len())
            .finish()
    }
}

/// In-memory credential state owned by the manager
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub authenticated: bool,
}

impl CredentialState {
    /// Fully populated state from a freshly issued pair.
    /// `authenticated` tracks a non-empty access token.
    pub fn from_pair(pair: TokenPair, expires_at: Option<DateTime<Utc>>) -> Self {
        let authenticated = !pair.access_token.is_empty();
        Self {
            access_token: Some(pair.access_token),
            refresh_token: Some(pair.refresh_token),
            expires_at,
            authenticated,
        }
    }

    /// Whether the access token is valid for longer than `buffer` past `now`.
    /// Unknown expiry counts as expiring.
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        if !self.authenticated {
            return false;
        }
        let Ok(buffer) = chrono::Duration::from_std(buffer) else {
            return false;
        };
        // A buffer past the end of the calendar can never be satisfied
        match (self.expires_at, now.checked_add_signed(buffer)) {
            (Some(exp), Some(threshold)) => exp > threshold,
            _ => false,
        }
    }

    pub fn status(&self, now: DateTime<Utc>, buffer: Duration) -> SessionStatus {
        if !self.authenticated {
            SessionStatus::Unauthenticated
        } else if self.is_fresh(now, buffer) {
            SessionStatus::Authenticated
        } else {
            SessionStatus::ExpiringSoon
        }
    }
}

impl fmt::Debug for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialState")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("authenticated", &self.authenticated)
            .finish()
    }
}

/// Login request body
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Refresh request body
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}
