// Session Auth - credential lifecycle manager for session-based identity endpoints

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod logging;

pub use auth::{AuthConfig, AuthMethod, CredentialManager, SessionClient, TokenPair};
pub use error::{ApiError, AuthError};
