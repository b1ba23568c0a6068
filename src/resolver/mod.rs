//! Turns user input (free text or a music-service link) into a playable track.

use std::sync::Arc;

use tracing::debug;

use crate::{
    common::errors::ResolveError,
    node::AudioApi,
    protocol::{LoadResult, Track},
};

pub mod spotify;

use spotify::SpotifyLink;

pub struct TrackResolver {
    node: Arc<dyn AudioApi>,
    spotify: SpotifyLink,
}

impl TrackResolver {
    pub fn new(node: Arc<dyn AudioApi>, client: reqwest::Client) -> Self {
        Self {
            node,
            spotify: SpotifyLink::new(client),
        }
    }

    /// Resolve a query to the single best-match track (first-result policy).
    ///
    /// Spotify links are normalized to a "title artist" search first; the
    /// audio itself always comes from the generic search path.
    pub async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
        let terms = match spotify::track_id(query) {
            Some(track_id) => {
                let terms = self.spotify.search_terms(&track_id).await?;
                debug!("Spotify link {} normalized to '{}'", track_id, terms);
                terms
            }
            None => query.trim().to_string(),
        };

        let result = self
            .node
            .load_tracks(&format!("ytsearch:{}", terms))
            .await
            .map_err(|e| ResolveError::Backend(e.to_string()))?;

        first_match(result)
    }
}

fn first_match(result: LoadResult) -> Result<Track, ResolveError> {
    match result {
        LoadResult::Track(track) => Ok(track),
        LoadResult::Search(tracks) => tracks.into_iter().next().ok_or(ResolveError::NoResults),
        LoadResult::Playlist(playlist) => playlist
            .tracks
            .into_iter()
            .next()
            .ok_or(ResolveError::NoResults),
        LoadResult::Empty {} => Err(ResolveError::NoResults),
        LoadResult::Error(err) => Err(ResolveError::Backend(
            err.message.unwrap_or(err.cause),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PlaylistData, PlaylistInfo, TrackInfo};

    fn track(title: &str) -> Track {
        Track {
            encoded: "blob".into(),
            info: TrackInfo {
                title: title.into(),
                author: "someone".into(),
                length: 1000,
                source_name: "youtube".into(),
                ..TrackInfo::default()
            },
            plugin_info: serde_json::json!({}),
            user_data: serde_json::json!({}),
        }
    }

    #[test]
    fn test_first_match_takes_head_of_search() {
        let result = LoadResult::Search(vec![track("a"), track("b")]);
        assert_eq!(first_match(result).unwrap().info.title, "a");
    }

    #[test]
    fn test_first_match_empty_search_is_no_results() {
        assert!(matches!(
            first_match(LoadResult::Search(vec![])),
            Err(ResolveError::NoResults)
        ));
        assert!(matches!(
            first_match(LoadResult::Empty {}),
            Err(ResolveError::NoResults)
        ));
    }

    #[test]
    fn test_first_match_playlist_takes_first_track() {
        let result = LoadResult::Playlist(PlaylistData {
            info: PlaylistInfo {
                name: "mix".into(),
                selected_track: -1,
            },
            plugin_info: serde_json::json!({}),
            tracks: vec![track("one"), track("two")],
        });
        assert_eq!(first_match(result).unwrap().info.title, "one");
    }

    #[test]
    fn test_first_match_load_error_is_backend_error() {
        let result = LoadResult::Error(crate::protocol::LoadError {
            message: Some("unavailable".into()),
            severity: crate::protocol::Severity::Common,
            cause: "SomethingException".into(),
        });
        match first_match(result) {
            Err(ResolveError::Backend(msg)) => assert_eq!(msg, "unavailable"),
            other => panic!("expected backend error, got {:?}", other),
        }
    }
}
