//! IGDB catalog queries: top games, screenshots, trailer video

use async_trait::async_trait;
use serde::Deserialize;

use super::client::IgdbClient;
use super::images;
use crate::error::SyncError;
use crate::models::RemoteGame;

/// IGDB rejects limits above 500.
const MAX_LIMIT: usize = 500;

/// Read side of the remote game database.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Highest-rated base games, best first, at most `limit` of them.
    async fn list_top_games(&self, token: &str, limit: usize) -> Result<Vec<RemoteGame>, SyncError>;

    /// Screenshot URLs for one game, normalised for the detail view.
    async fn list_screenshots(&self, token: &str, remote_id: &str) -> Result<Vec<String>, SyncError>;

    /// First trailer video id for one game, if it has any.
    async fn fetch_video(&self, token: &str, remote_id: &str) -> Result<Option<String>, SyncError>;
}

/// Top-rated main games that are not an edition/version of another game.
pub fn listing_query(limit: usize) -> String {
    format!(
        "fields name,cover.url,summary,storyline; \
         where category = 0 & version_parent = null; \
         sort total_rating desc; \
         limit {};",
        limit.clamp(1, MAX_LIMIT)
    )
}

pub fn screenshots_query(remote_id: u64) -> String {
    format!("fields url; where game = {};", remote_id)
}

pub fn video_query(remote_id: u64) -> String {
    format!("fields videos.video_id; where id = {}; limit 1;", remote_id)
}

/// Remote ids are embedded in query text, so only plain integers pass.
pub fn parse_remote_id(remote_id: &str) -> Result<u64, SyncError> {
    remote_id
        .trim()
        .parse::<u64>()
        .map_err(|_| SyncError::InvalidRemoteId(remote_id.to_string()))
}

#[derive(Debug, Deserialize)]
struct Screenshot {
    url: Option<String>,
}

pub fn parse_games(body: &str) -> Result<Vec<RemoteGame>, SyncError> {
    serde_json::from_str(body).map_err(|e| SyncError::parse("games response", e))
}

pub fn parse_screenshots(body: &str) -> Result<Vec<String>, SyncError> {
    let shots: Vec<Screenshot> =
        serde_json::from_str(body).map_err(|e| SyncError::parse("screenshots response", e))?;
    Ok(shots
        .into_iter()
        .filter_map(|s| s.url)
        .filter(|u| !u.trim().is_empty())
        .map(|u| images::screenshot_url(&u))
        .collect())
}

pub fn parse_video(body: &str) -> Result<Option<String>, SyncError> {
    let games: Vec<RemoteGame> =
        serde_json::from_str(body).map_err(|e| SyncError::parse("video response", e))?;
    Ok(games
        .into_iter()
        .flat_map(|g| g.videos)
        .find_map(|v| v.video_id.filter(|id| !id.is_empty())))
}

/// [`Catalog`] backed by the live IGDB API.
pub struct CatalogClient {
    client: IgdbClient,
}

impl CatalogClient {
    pub fn new(client: IgdbClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn list_top_games(&self, token: &str, limit: usize) -> Result<Vec<RemoteGame>, SyncError> {
        let body = self.client.query("games", &listing_query(limit), token).await?;
        let games = parse_games(&body)?;
        tracing::debug!("Listing returned {} games", games.len());
        Ok(games)
    }

    async fn list_screenshots(&self, token: &str, remote_id: &str) -> Result<Vec<String>, SyncError> {
        let id = parse_remote_id(remote_id)?;
        let body = self.client.query("screenshots", &screenshots_query(id), token).await?;
        parse_screenshots(&body)
    }

    async fn fetch_video(&self, token: &str, remote_id: &str) -> Result<Option<String>, SyncError> {
        let id = parse_remote_id(remote_id)?;
        let body = self.client.query("games", &video_query(id), token).await?;
        parse_video(&body)
    }
}
