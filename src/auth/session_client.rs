// Session endpoint client

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

use super::types::{LoginRequest, RefreshRequest, TokenPair};
use crate::error::{AuthError, Result};

/// Boundary to the remote identity endpoint.
///
/// Implementations perform exactly one network call per method and
/// never retry; retries belong to the caller around `ensure_valid()`.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Exchange username/password for a fresh token pair
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair>;

    /// Exchange a refresh token for a fresh token pair
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair>;
}

/// reqwest-backed `SessionClient` speaking the `/api/sessions/` contract
pub struct HttpSessionClient {
    client: Client,
    base_url: String,
}

impl HttpSessionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Reuse an existing connection pool
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn login_url(&self) -> String {
        format!("{}/api/sessions/", self.base_url)
    }

    fn refresh_url(&self) -> String {
        format!("{}/api/sessions/refresh/", self.base_url)
    }

    /// Turn a session endpoint response into a token pair
    async fn read_token_pair(response: Response, operation: &str) -> Result<TokenPair> {
        let status = response.status();
        if !status.is_success() {
            // Body may echo submitted values, so only its size is logged
            let body_len = response.bytes().await.map(|b| b.len()).unwrap_or(0);
            tracing::warn!(
                operation,
                status = status.as_u16(),
                body_len,
                "Session endpoint returned error status"
            );
            return Err(AuthError::from_status(status.as_u16()));
        }

        let pair: TokenPair = response.json().await.map_err(|e| {
            AuthError::InvalidResponse(format!("{} response is not a token pair: {}", operation, e.without_url()))
        })?;

        if pair.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(format!(
                "{} response does not contain access_token",
                operation
            )));
        }
        if pair.refresh_token.is_empty() {
            return Err(AuthError::InvalidResponse(format!(
                "{} response does not contain refresh_token",
                operation
            )));
        }

        Ok(pair)
    }
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        tracing::info!(has_username = !username.is_empty(), "Logging in via session endpoint...");

        let response = self
            .client
            .post(self.login_url())
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let pair = Self::read_token_pair(response, "login").await?;

        tracing::info!(
            access_token_len = pair.access_token.len(),
            refresh_token_len = pair.refresh_token.len(),
            "Login succeeded"
        );
        Ok(pair)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        tracing::info!("Refreshing access token via session endpoint...");

        let response = self
            .client
            .post(self.refresh_url())
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        let pair = Self::read_token_pair(response, "refresh").await?;

        tracing::info!(
            access_token_len = pair.access_token.len(),
            refresh_token_len = pair.refresh_token.len(),
            "Token refreshed"
        );
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> HttpSessionClient {
        HttpSessionClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_login_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/sessions/")
            .match_body(Matcher::Json(json!({"username": "alice", "password": "pw"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "A1", "refresh_token": "R1"}"#)
            .expect(1)
            .create_async()
            .await;

        let pair = client_for(&server).login("alice", "pw").await.unwrap();
        assert_eq!(pair, TokenPair::new("A1", "R1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_rejected_is_authentication_error() {
        for status in [401, 403] {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("POST", "/api/sessions/")
                .with_status(status)
                .with_body(r#"{"detail": "No active account"}"#)
                .expect(1)
                .create_async()
                .await;

            let err = client_for(&server).login("alice", "bad").await.unwrap_err();
            assert_eq!(err, AuthError::Authentication { status: status as u16 });
            assert!(!err.is_retryable());
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/sessions/refresh/")
            .match_body(Matcher::Json(json!({"refresh": "R1"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "A2", "refresh_token": "R2"}"#)
            .create_async()
            .await;

        let pair = client_for(&server).refresh("R1").await.unwrap();
        assert_eq!(pair, TokenPair::new("A2", "R2"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_expired_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/sessions/refresh/")
            .with_status(401)
            .create_async()
            .await;

        let err = client_for(&server).refresh("R1").await.unwrap_err();
        assert_eq!(err, AuthError::Authentication { status: 401 });
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/sessions/")
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server).login("alice", "pw").await.unwrap_err();
        assert_eq!(err, AuthError::UnexpectedStatus { status: 503 });
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_incomplete_pair_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/sessions/refresh/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "A2"}"#)
            .create_async()
            .await;

        let err = client_for(&server).refresh("R1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));

        let _empty = server
            .mock("POST", "/api/sessions/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "", "refresh_token": "R1"}"#)
            .create_async()
            .await;

        let err = client_for(&server).login("alice", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        // Nothing listens on port 9 (discard) in the test environment
        let client = HttpSessionClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.login("alice", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_urls_trim_trailing_slash() {
        let client = HttpSessionClient::with_client(Client::new(), "https://auth.example.com/");
        assert_eq!(client.login_url(), "https://auth.example.com/api/sessions/");
        assert_eq!(
            client.refresh_url(),
            "https://auth.example.com/api/sessions/refresh/"
        );
    }
}
