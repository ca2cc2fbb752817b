//! IGDB image URL normalisation
//!
//! Upstream image URLs look like
//! `//images.igdb.com/igdb/image/upload/t_thumb/co1wyy.jpg`: scheme-relative
//! and sized for a thumbnail. Callers always get an absolute `https:` URL with
//! the size segment swapped for the one they display. Normalising an already
//! normalised URL returns it unchanged.

/// Shown when a game has no cover.
pub const PLACEHOLDER_COVER: &str =
    "https://images.igdb.com/igdb/image/upload/t_cover_big/nocover.png";

const THUMB: &str = "t_thumb";
const COVER_BIG: &str = "t_cover_big";
const SCREENSHOT_MED: &str = "t_screenshot_med";

/// Cover URL for a list card, or the placeholder when there is none.
pub fn cover_url(url: Option<&str>) -> String {
    match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => normalize(url, COVER_BIG),
        None => PLACEHOLDER_COVER.to_string(),
    }
}

/// Screenshot URL for the detail view.
pub fn screenshot_url(url: &str) -> String {
    normalize(url.trim(), SCREENSHOT_MED)
}

fn normalize(url: &str, size: &str) -> String {
    let resized = url.replacen(&format!("/{}/", THUMB), &format!("/{}/", size), 1);
    if resized.starts_with("//") {
        format!("https:{}", resized)
    } else {
        resized
    }
}
