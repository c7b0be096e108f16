use anyhow::Result;
use std::sync::Arc;

use session_auth::auth::{AuthMethod, CredentialManager};
use session_auth::config::Config;
use session_auth::http_client::AuthenticatedHttpClient;
use session_auth::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    logging::init(&config.log_level, config.log_format)?;
    config.validate()?;

    tracing::info!("Session auth starting...");
    tracing::debug!("Configuration: {:?}", config);

    let manager = Arc::new(CredentialManager::new(config.auth_config())?);
    tracing::info!(method = ?manager.method(), base_url = %config.base_url, "Credential manager ready");

    match manager.ensure_valid().await {
        Ok(()) => match manager.method() {
            AuthMethod::SessionCredentials => {
                tracing::info!(
                    has_access_token = manager.snapshot().authenticated,
                    expires_at = ?manager.expires_at(),
                    "✅ Authentication successful"
                );
            }
            AuthMethod::StaticToken => {
                tracing::info!("✅ Using static token authentication");
            }
        },
        Err(e) => {
            tracing::error!("❌ Authentication failed: {}", e);
            anyhow::bail!("Startup failed: unable to authenticate against {}", config.base_url);
        }
    }

    if let Some(path) = &config.check_path {
        let client = AuthenticatedHttpClient::new(
            manager.clone(),
            &config.base_url,
            config.http_connect_timeout,
            config.http_request_timeout,
            config.http_max_retries,
        )?;

        let response = client.get(path).await?;
        tracing::info!(path = %path, status = response.status().as_u16(), "Check request completed");
    }

    Ok(())
}
