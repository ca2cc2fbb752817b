//! Game-related models

use serde::Deserialize;

use crate::api::images;

pub const NO_SUMMARY: &str = "No summary available";
pub const NO_DESCRIPTION: &str = "No description available";

/// Game as returned by the IGDB `games` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteGame {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub cover: Option<RemoteImage>,
    pub summary: Option<String>,
    pub storyline: Option<String>,
    #[serde(default)]
    pub videos: Vec<RemoteVideo>,
}

/// Image reference; `url` is scheme-relative and thumbnail-sized upstream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteImage {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteVideo {
    pub video_id: Option<String>,
}

/// Game record ready to be written to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGameRecord {
    pub remote_id: String,
    pub name: String,
    pub image_url: String,
    pub summary: String,
    pub description: String,
}

impl NewGameRecord {
    /// Map an upstream game, normalising its cover and filling placeholders.
    pub fn from_remote(game: &RemoteGame) -> Self {
        let cover = game.cover.as_ref().and_then(|c| c.url.as_deref());
        Self {
            remote_id: game.id.to_string(),
            name: game.name.clone(),
            image_url: images::cover_url(cover),
            summary: non_blank(game.summary.as_deref()).unwrap_or(NO_SUMMARY).to_string(),
            description: non_blank(game.storyline.as_deref())
                .unwrap_or(NO_DESCRIPTION)
                .to_string(),
        }
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

/// Game record as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    /// Surrogate key assigned by the cache
    pub id: i64,
    /// Upstream IGDB id, in string form
    pub remote_id: String,
    pub name: String,
    pub image_url: String,
    pub summary: String,
    pub description: String,
}

/// Detail-view extras fetched on demand and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub screenshots: Vec<String>,
    pub video_id: Option<String>,
}

impl Enrichment {
    /// IGDB video ids are YouTube ids.
    pub fn video_url(&self) -> Option<String> {
        self.video_id
            .as_ref()
            .map(|id| format!("https://www.youtube.com/watch?v={}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_summary_gets_placeholders() {
        let game = RemoteGame {
            id: 1942,
            name: "The Witcher 3".into(),
            ..Default::default()
        };
        let record = NewGameRecord::from_remote(&game);
        assert_eq!(record.remote_id, "1942");
        assert_eq!(record.summary, "No summary available");
        assert_eq!(record.description, "No description available");
        assert_eq!(record.image_url, images::PLACEHOLDER_COVER);
    }

    #[test]
    fn test_cover_is_normalised() {
        let game: RemoteGame = serde_json::from_str(
            r#"{"id":7,"name":"Doom","cover":{"id":1,"url":"//images.igdb.com/igdb/image/upload/t_thumb/co1.jpg"},"summary":"Demons","storyline":"Mars"}"#,
        )
        .unwrap();
        let record = NewGameRecord::from_remote(&game);
        assert_eq!(
            record.image_url,
            "https://images.igdb.com/igdb/image/upload/t_cover_big/co1.jpg"
        );
        assert_eq!(record.summary, "Demons");
        assert_eq!(record.description, "Mars");
    }

    #[test]
    fn test_blank_summary_is_missing() {
        let game = RemoteGame {
            id: 3,
            summary: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(NewGameRecord::from_remote(&game).summary, NO_SUMMARY);
    }

    #[test]
    fn test_video_url() {
        let enrichment = Enrichment {
            screenshots: vec![],
            video_id: Some("dQw4w9WgXcQ".into()),
        };
        assert_eq!(
            enrichment.video_url().as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(Enrichment::default().video_url(), None);
    }
}
