use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Password;
use std::fmt;
use std::time::Duration;

use crate::auth::{select_auth_method, AuthConfig};
use crate::logging::{parse_log_format, LogFormat};

/// Upper bound for the refresh buffer (one day)
const MAX_REFRESH_BUFFER_SECONDS: u64 = 86_400;

/// Session credential manager
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the identity service
    #[arg(short = 'u', long, env = "SESSION_BASE_URL")]
    pub base_url: String,

    /// Username for session login
    #[arg(long, env = "SESSION_USERNAME")]
    pub username: Option<String>,

    /// Password for session login
    #[arg(long, env = "SESSION_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Prompt for the password when a username is set without one
    #[arg(long)]
    pub prompt_password: bool,

    /// Static API token, used when session credentials are absent
    #[arg(long, env = "SESSION_STATIC_TOKEN", hide_env_values = true)]
    pub static_token: Option<String>,

    /// Seconds before expiry at which tokens are refreshed
    #[arg(long, env = "REFRESH_BUFFER_SECONDS", default_value = "60")]
    pub refresh_buffer: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub http_connect_timeout: u64,

    /// HTTP max retries
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value = "3")]
    pub http_retries: u32,

    /// Path to GET with the obtained credentials after authenticating
    #[arg(long)]
    pub check: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    // Identity service
    pub base_url: String,

    // Credentials
    pub username: Option<String>,
    pub password: Option<String>,
    pub static_token: Option<String>,

    // Token lifecycle
    pub refresh_buffer_seconds: u64,

    // HTTP client
    pub http_request_timeout: u64,
    pub http_connect_timeout: u64,
    pub http_max_retries: u32,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,

    pub check_path: Option<String>,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let prompt = args.prompt_password;
        let mut config = Self::from_args(args);

        if prompt && config.username.is_some() && config.password.is_none() {
            let password = Password::new()
                .with_prompt("Password")
                .interact()
                .context("Failed to read password")?;
            config.password = Some(password);
        }

        Ok(config)
    }

    /// Build configuration from already-parsed arguments
    pub fn from_args(args: CliArgs) -> Self {
        Config {
            base_url: args.base_url.trim_end_matches('/').to_string(),
            username: non_empty(args.username),
            password: non_empty(args.password),
            static_token: non_empty(args.static_token),
            refresh_buffer_seconds: args.refresh_buffer,
            http_request_timeout: args.http_timeout,
            http_connect_timeout: args.http_connect_timeout,
            http_max_retries: args.http_retries,
            log_level: args.log_level,
            log_format: parse_log_format(&args.log_format),
            check_path: args.check,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            anyhow::bail!(
                "SESSION_BASE_URL must start with http:// or https://: {}",
                self.base_url
            );
        }

        if self.refresh_buffer_seconds > MAX_REFRESH_BUFFER_SECONDS {
            anyhow::bail!(
                "REFRESH_BUFFER_SECONDS must be at most {}: {}",
                MAX_REFRESH_BUFFER_SECONDS,
                self.refresh_buffer_seconds
            );
        }

        select_auth_method(&self.auth_config())
            .context("Set SESSION_USERNAME and SESSION_PASSWORD, or SESSION_STATIC_TOKEN")?;

        Ok(())
    }

    /// Read-only settings handed to the credential manager
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            base_url: self.base_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            static_token: self.static_token.clone(),
            refresh_buffer: Duration::from_secs(self.refresh_buffer_seconds),
            request_timeout: Duration::from_secs(self.http_request_timeout),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .field("has_static_token", &self.static_token.is_some())
            .field("refresh_buffer_seconds", &self.refresh_buffer_seconds)
            .field("http_request_timeout", &self.http_request_timeout)
            .field("http_connect_timeout", &self.http_connect_timeout)
            .field("http_max_retries", &self.http_max_retries)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("check_path", &self.check_path)
            .finish()
    }
}

/// Treat empty strings from the environment as unset
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
