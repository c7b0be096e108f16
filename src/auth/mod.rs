// Authentication module
// Manages session token lifecycle against the identity endpoint

mod credentials;
mod expiry;
mod manager;
mod session_client;
mod store;
mod types;

pub use credentials::select_auth_method;
pub use expiry::{decode_expiry, parse_expiry, Clock, FixedClock, SystemClock};
pub use manager::{CredentialManager, CredentialManagerBuilder};
pub use session_client::{HttpSessionClient, SessionClient};
pub use store::CredentialStore;
pub use types::{
    AuthConfig, AuthMethod, CredentialState, SessionStatus, TokenPair, DEFAULT_REFRESH_BUFFER,
};
