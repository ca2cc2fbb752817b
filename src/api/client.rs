//! Authenticated HTTP client for the IGDB API
//!
//! Wraps reqwest::Client with the `Client-ID` and bearer headers IGDB expects
//! on every request.

use crate::error::SyncError;

/// Thin IGDB client; every endpoint is a POST carrying a query body.
#[derive(Clone)]
pub struct IgdbClient {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
}

impl IgdbClient {
    pub fn new(api_base: &str, client_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
        }
    }

    /// POST a query to `{api_base}/{endpoint}` and return the response body.
    pub async fn query(&self, endpoint: &str, body: &str, token: &str) -> Result<String, SyncError> {
        if token.is_empty() {
            return Err(SyncError::Unauthenticated);
        }

        let url = format!("{}/{}", self.api_base, endpoint);
        tracing::debug!("IGDB POST {} <- {}", url, body);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Client-ID", &self.client_id)
            .header("Accept", "application/json")
            .body(body.to_string())
            .send()
            .await?;

        let resp = check_response(resp, &url).await?;
        Ok(resp.text().await?)
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        tracing::warn!("401 Unauthorized for {}; token may be revoked, try `gamedex auth --force`", url);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SyncError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}
