// Error handling module
// Defines the credential error taxonomy and the HTTP collaborator errors

use thiserror::Error;

/// Errors produced while obtaining or maintaining credentials.
///
/// Messages carry status codes and short descriptions only; token and
/// password values never end up in an error string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Invalid credentials or insufficient permission (401/403 on login)
    #[error("Authentication failed: server rejected credentials ({status})")]
    Authentication { status: u16 },

    /// Refresh call failed; triggers a fallback login and is not surfaced
    /// unless that login fails as well
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Transport-level failure talking to the session endpoint
    #[error("Network error: {0}")]
    Network(String),

    /// Token could not be decoded for its expiration claim
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Session endpoint answered 2xx with a body we cannot use
    #[error("Invalid session response: {0}")]
    InvalidResponse(String),

    /// Session endpoint answered with a status outside the contract
    #[error("Unexpected session endpoint status: {status}")]
    UnexpectedStatus { status: u16 },

    /// Neither session credentials nor a static token are usable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Refresh task panicked or was aborted
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether a caller-side retry wrapper may re-invoke `ensure_valid()`.
    /// Credential rejections are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Network(_) => true,
            AuthError::UnexpectedStatus { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Map a non-success status from a session endpoint call.
    pub(crate) fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => AuthError::Authentication { status },
            _ => AuthError::UnexpectedStatus { status },
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        // Strip the URL so query strings never leak into logs
        let e = e.without_url();
        if e.is_decode() {
            AuthError::InvalidResponse(e.to_string())
        } else {
            AuthError::Network(e.to_string())
        }
    }
}

/// Errors surfaced by the authenticated HTTP client wrapper
#[derive(Error, Debug)]
pub enum ApiError {
    /// Could not obtain valid credentials
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Upstream API answered with a non-success status
    #[error("Upstream API error: {status} - {message}")]
    Upstream { status: u16, message: String },

    /// Transport failure after all retries
    #[error("Request failed: {0}")]
    Transport(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AuthError::Authentication { status: 401 };
        assert_eq!(
            err.to_string(),
            "Authentication failed: server rejected credentials (401)"
        );

        let err = AuthError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = AuthError::UnexpectedStatus { status: 502 };
        assert_eq!(err.to_string(), "Unexpected session endpoint status: 502");
    }

    #[test]
    fn test_from_status() {
        assert_eq!(
            AuthError::from_status(401),
            AuthError::Authentication { status: 401 }
        );
        assert_eq!(
            AuthError::from_status(403),
            AuthError::Authentication { status: 403 }
        );
        assert_eq!(
            AuthError::from_status(500),
            AuthError::UnexpectedStatus { status: 500 }
        );
        assert_eq!(
            AuthError::from_status(400),
            AuthError::UnexpectedStatus { status: 400 }
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AuthError::Network("timeout".to_string()).is_retryable());
        assert!(AuthError::UnexpectedStatus { status: 503 }.is_retryable());
        assert!(AuthError::UnexpectedStatus { status: 429 }.is_retryable());

        assert!(!AuthError::UnexpectedStatus { status: 400 }.is_retryable());
        assert!(!AuthError::Authentication { status: 401 }.is_retryable());
        assert!(!AuthError::Authentication { status: 403 }.is_retryable());
        assert!(!AuthError::RefreshFailed("expired".to_string()).is_retryable());
        assert!(!AuthError::Configuration("missing".to_string()).is_retryable());
        assert!(!AuthError::InvalidResponse("empty".to_string()).is_retryable());
    }

    #[test]
    fn test_api_error_from_auth_error() {
        let err: ApiError = AuthError::Authentication { status: 403 }.into();
        assert_eq!(
            err.to_string(),
            "Authentication failed: Authentication failed: server rejected credentials (403)"
        );

        let err = ApiError::Upstream {
            status: 404,
            message: "Not found".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream API error: 404 - Not found");
    }

    #[test]
    fn test_internal_error_message() {
        let err = ApiError::Internal(anyhow::anyhow!("Something went wrong"));
        assert_eq!(err.to_string(), "Internal error: Something went wrong");
    }
}
