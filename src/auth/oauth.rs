//! OAuth2 client-credentials exchange and token lifecycle

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use oauth2::{
    basic::{BasicClient, BasicErrorResponse},
    AuthType, AuthUrl, ClientId, ClientSecret, RequestTokenError, TokenResponse, TokenUrl,
};
use tokio::sync::Mutex;

use super::{AuthConfig, Credential, TokenStore};
use crate::error::SyncError;

/// Raw result of a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in_secs: u64,
}

/// Something that can trade application credentials for an access token.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self) -> Result<TokenGrant, SyncError>;
}

/// Client-credentials grant against the configured token endpoint.
pub struct ClientCredentialsExchange {
    client: BasicClient,
}

impl ClientCredentialsExchange {
    pub fn new(auth_config: &AuthConfig) -> Result<Self> {
        // The flow never visits the authorize endpoint, but BasicClient wants one.
        let auth_url = AuthUrl::new(auth_config.token_url.clone()).context("Invalid token URL")?;
        let token_url =
            TokenUrl::new(auth_config.token_url.clone()).context("Invalid token URL")?;

        let client = BasicClient::new(
            ClientId::new(auth_config.client_id.clone()),
            Some(ClientSecret::new(auth_config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        Ok(Self { client })
    }
}

#[async_trait]
impl TokenExchange for ClientCredentialsExchange {
    async fn exchange(&self) -> Result<TokenGrant, SyncError> {
        tracing::debug!("Requesting client-credentials token");

        let token_response = self
            .client
            .exchange_client_credentials()
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(exchange_error)?;

        let expires_in = token_response
            .expires_in()
            .ok_or_else(|| SyncError::parse("token response", "missing expires_in"))?;

        Ok(TokenGrant {
            access_token: token_response.access_token().secret().to_string(),
            expires_in_secs: expires_in.as_secs(),
        })
    }
}

fn exchange_error(
    err: RequestTokenError<oauth2::reqwest::Error<reqwest::Error>, BasicErrorResponse>,
) -> SyncError {
    match err {
        RequestTokenError::ServerResponse(resp) => SyncError::AuthExchange(resp.to_string()),
        RequestTokenError::Request(e) => SyncError::Transport(e.to_string()),
        RequestTokenError::Parse(e, _) => SyncError::parse("token response", e),
        RequestTokenError::Other(msg) => SyncError::AuthExchange(msg),
    }
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Hands out a valid credential, refreshing it through the exchange when the
/// stored one is missing or expired.
///
/// The store sits behind an async mutex: only one refresh runs at a time, and
/// callers queued behind it see the credential it wrote.
pub struct TokenProvider {
    store: Mutex<Box<dyn TokenStore>>,
    exchange: Arc<dyn TokenExchange>,
    clock: Clock,
}

impl TokenProvider {
    pub fn new(store: Box<dyn TokenStore>, exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            store: Mutex::new(store),
            exchange,
            clock: Arc::new(system_clock),
        }
    }

    #[cfg(test)]
    /// Replace the wall clock (epoch millis).
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn now_millis(&self) -> i64 {
        (self.clock)()
    }

    /// Stored credential without any validity check or network call.
    pub async fn current(&self) -> Credential {
        self.store.lock().await.credential()
    }

    /// Valid credential, or an empty one if none could be obtained.
    ///
    /// Callers must treat an empty token as unauthenticated.
    pub async fn ensure_valid_token(&self) -> Credential {
        match self.try_ensure_valid_token().await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("Could not obtain access token: {:#}", e);
                Credential::empty()
            }
        }
    }

    /// Like [`ensure_valid_token`](Self::ensure_valid_token) but keeps the failure.
    pub async fn try_ensure_valid_token(&self) -> Result<Credential, SyncError> {
        let mut store = self.store.lock().await;
        let stored = store.credential();
        if !stored.is_expired_at(self.now_millis()) {
            return Ok(stored);
        }

        if stored.is_empty() {
            tracing::info!("No access token stored, requesting one...");
        } else {
            tracing::info!("Access token expired, refreshing...");
        }
        self.exchange_into(store.as_mut()).await
    }

    /// Exchange unconditionally, replacing whatever is stored.
    pub async fn refresh(&self) -> Result<Credential, SyncError> {
        let mut store = self.store.lock().await;
        tracing::info!("Forcing access token refresh...");
        self.exchange_into(store.as_mut()).await
    }

    async fn exchange_into(&self, store: &mut dyn TokenStore) -> Result<Credential, SyncError> {
        let grant = self.exchange.exchange().await?;
        if grant.access_token.is_empty() {
            return Err(SyncError::parse("token response", "empty access_token"));
        }

        let credential =
            Credential::issued(grant.access_token, self.now_millis(), grant.expires_in_secs);

        // The token is still usable for this process even if it could not be saved.
        if let Err(e) = store.store(&credential) {
            tracing::warn!("Failed to persist access token: {:#}", e);
        }

        tracing::info!(
            "Access token acquired (expires_at: {})",
            credential.expires_at_millis
        );
        Ok(credential)
    }
}
