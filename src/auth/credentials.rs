// Authentication method selection

use super::types::{AuthConfig, AuthMethod};
use crate::error::{AuthError, Result};

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Pick the authentication method from configuration.
///
/// Session credentials (username and password both set) win over a
/// static token. Neither being usable is a configuration error.
pub fn select_auth_method(config: &AuthConfig) -> Result<AuthMethod> {
    let has_session = present(&config.username) && present(&config.password);
    let has_static = present(&config.static_token);

    if has_session {
        if has_static {
            tracing::debug!("Both session credentials and static token configured, using session credentials");
        }
        tracing::info!("Selected auth method: session credentials");
        return Ok(AuthMethod::SessionCredentials);
    }

    if has_static {
        if present(&config.username) || present(&config.password) {
            tracing::warn!(
                has_username = present(&config.username),
                has_password = present(&config.password),
                "Incomplete session credentials, falling back to static token"
            );
        }
        tracing::info!("Selected auth method: static token");
        return Ok(AuthMethod::StaticToken);
    }

    Err(AuthError::Configuration(
        "either username and password or a static token must be configured".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(
        username: Option<&str>,
        password: Option<&str>,
        static_token: Option<&str>,
    ) -> AuthConfig {
        AuthConfig {
            username: username.map(String::from),
            password: password.map(String::from),
            static_token: static_token.map(String::from),
            ..AuthConfig::with_static_token("http://localhost", "")
        }
    }

    #[test]
    fn test_session_credentials_win() {
        let cfg = config(Some("alice"), Some("pw"), Some("tok"));
        assert_eq!(select_auth_method(&cfg), Ok(AuthMethod::SessionCredentials));

        let cfg = config(Some("alice"), Some("pw"), None);
        assert_eq!(select_auth_method(&cfg), Ok(AuthMethod::SessionCredentials));
    }

    #[test]
    fn test_static_token_fallback() {
        let cfg = config(None, None, Some("tok"));
        assert_eq!(select_auth_method(&cfg), Ok(AuthMethod::StaticToken));

        // Username without password is not a usable session
        let cfg = config(Some("alice"), None, Some("tok"));
        assert_eq!(select_auth_method(&cfg), Ok(AuthMethod::StaticToken));

        let cfg = config(Some("alice"), Some(""), Some("tok"));
        assert_eq!(select_auth_method(&cfg), Ok(AuthMethod::StaticToken));
    }

    #[test]
    fn test_nothing_configured_is_an_error() {
        let cfg = config(None, None, None);
        assert!(matches!(
            select_auth_method(&cfg),
            Err(AuthError::Configuration(_))
        ));

        let cfg = config(Some("alice"), None, Some(""));
        assert!(matches!(
            select_auth_method(&cfg),
            Err(AuthError::Configuration(_))
        ));
    }
}
