//! Authentication module for the IGDB API
//!
//! IGDB accepts Twitch application tokens obtained through the OAuth2
//! client-credentials flow. The token is cached in a [`TokenStore`] and only
//! re-requested once it has expired.

pub mod oauth;
pub mod tokens;

pub use oauth::{ClientCredentialsExchange, TokenExchange, TokenGrant, TokenProvider};
pub use tokens::{Credential, FileTokenStore, TokenStore};
#[cfg(test)]
pub use tokens::MemoryTokenStore;

use crate::config::Config;

/// Twitch application credentials for the client-credentials exchange
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Application client id
    pub client_id: String,
    /// Application client secret
    pub client_secret: String,
    /// Token endpoint
    pub token_url: String,
}

impl AuthConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config.token_url.clone(),
        }
    }
}
