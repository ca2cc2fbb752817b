//! Error taxonomy for the token, catalog, and cache layers.

use thiserror::Error;

/// Failure of a single credential, catalog, or cache operation.
///
/// Each component returns these from its operations; callers decide where a
/// failure is downgraded to an empty result (and logged).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The client-credentials exchange was rejected or could not be completed.
    #[error("token exchange failed: {0}")]
    AuthExchange(String),

    /// No usable access token is available for an outbound call.
    #[error("no valid access token (check client id/secret, then run `gamedex auth`)")]
    Unauthenticated,

    /// The request never produced an HTTP response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    /// Remote ids are upstream integers; anything else is refused before a
    /// query is built.
    #[error("invalid remote id {0:?}")]
    InvalidRemoteId(String),

    #[error("cache write failed: {0}")]
    CacheWrite(String),

    #[error("cache read failed: {0}")]
    CacheRead(String),
}

impl SyncError {
    pub fn parse(what: &'static str, detail: impl ToString) -> Self {
        SyncError::Parse {
            what,
            detail: detail.to_string(),
        }
    }

    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::parse("response body", err)
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::Transport("reset".into()).is_transient());
        let http = |status| SyncError::Http {
            status,
            url: "u".into(),
            body: String::new(),
        };
        assert!(http(503).is_transient());
        assert!(http(429).is_transient());
        assert!(!http(401).is_transient());
        assert!(!http(400).is_transient());
        assert!(!SyncError::parse("games", "eof").is_transient());
        assert!(!SyncError::Unauthenticated.is_transient());
    }

    #[test]
    fn test_display_includes_context() {
        let err = SyncError::Http {
            status: 401,
            url: "https://api.igdb.com/v4/games".into(),
            body: "unauthorized".into(),
        };
        let text = err.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("/v4/games"));
    }
}
