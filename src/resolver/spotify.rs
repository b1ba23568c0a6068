use regex::Regex;
use tracing::error;

use crate::common::errors::ResolveError;

const EMBED_BASE: &str = "https://open.spotify.com/embed/track/";

/// Extract a Spotify track id from either link form:
/// `spotify:track:<id>` or `https://open.spotify.com/track/<id>?...`.
pub fn track_id(input: &str) -> Option<String> {
    let rest = if let Some(rest) = input.strip_prefix("spotify:track:") {
        rest
    } else if let Some(idx) = input.find("open.spotify.com/track/") {
        &input[idx + "open.spotify.com/track/".len()..]
    } else {
        return None;
    };

    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();

    if id.is_empty() { None } else { Some(id) }
}

/// Fetches track metadata from Spotify's embed page. No credentials needed;
/// the page inlines the title and artist of the embedded track.
pub struct SpotifyLink {
    client: reqwest::Client,
    title_regex: Regex,
    artist_regex: Regex,
}

impl SpotifyLink {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            title_regex: Regex::new(r#""title":"([^"]+)""#).unwrap(),
            artist_regex: Regex::new(r#""subtitle":"([^"]+)""#).unwrap(),
        }
    }

    /// Return a "title artist" search string for the given track id.
    pub async fn search_terms(&self, track_id: &str) -> Result<String, ResolveError> {
        let url = format!("{}{}", EMBED_BASE, track_id);
        let response = self
            .client
            .get(&url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch Spotify embed page: {}", e);
                ResolveError::Backend(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(ResolveError::UnsupportedLink(track_id.to_string()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ResolveError::Backend(e.to_string()))?;

        let title = self
            .title_regex
            .captures(&html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        let artist = self
            .artist_regex
            .captures(&html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());

        match (title, artist) {
            (Some(title), Some(artist)) => Ok(format!("{} {}", title, artist)),
            (Some(title), None) => Ok(title.to_string()),
            _ => Err(ResolveError::UnsupportedLink(track_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_from_uri_form() {
        assert_eq!(
            track_id("spotify:track:6rqhFgbbKwnb9MLmUQDhG6").as_deref(),
            Some("6rqhFgbbKwnb9MLmUQDhG6")
        );
    }

    #[test]
    fn test_track_id_from_open_link() {
        assert_eq!(
            track_id("https://open.spotify.com/track/6rqhFgbbKwnb9MLmUQDhG6").as_deref(),
            Some("6rqhFgbbKwnb9MLmUQDhG6")
        );
    }

    #[test]
    fn test_track_id_strips_query_params() {
        assert_eq!(
            track_id("https://open.spotify.com/track/6rqhFgbbKwnb9MLmUQDhG6?si=abc123").as_deref(),
            Some("6rqhFgbbKwnb9MLmUQDhG6")
        );
    }

    #[test]
    fn test_non_spotify_input_is_ignored() {
        assert!(track_id("never gonna give you up").is_none());
        assert!(track_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_none());
        assert!(track_id("https://open.spotify.com/playlist/xyz").is_none());
    }

    #[test]
    fn test_empty_id_is_rejected() {
        assert!(track_id("spotify:track:").is_none());
        assert!(track_id("https://open.spotify.com/track/?si=x").is_none());
    }
}
