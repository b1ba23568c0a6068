//! Listening-session tracking and Last.fm submission.

use async_trait::async_trait;

use crate::common::errors::LastFmError;

pub mod accounts;
pub mod lastfm;
pub mod scheduler;

pub use accounts::{AccountStore, LinkedAccount};
pub use lastfm::LastFmClient;
pub use scheduler::ScrobbleScheduler;

/// One play of one track, as reported to the profile service.
#[derive(Debug, Clone)]
pub struct Listen {
    pub artist: String,
    pub track: String,
    pub album: Option<String>,
    pub duration_secs: Option<u64>,
}

impl Listen {
    pub fn from_track(track: &crate::protocol::Track) -> Self {
        Self {
            artist: track.info.author.clone(),
            track: track.info.title.clone(),
            album: track.album().map(|s| s.to_string()),
            duration_secs: if track.info.length > 0 {
                Some(track.info.length / 1000)
            } else {
                None
            },
        }
    }
}

/// External music-profile service (Last.fm in production).
///
/// `update_now_playing` is transient; `scrobble` persists a play record.
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn update_now_playing(
        &self,
        session_key: &str,
        listen: &Listen,
    ) -> Result<(), LastFmError>;

    async fn scrobble(
        &self,
        session_key: &str,
        listen: &Listen,
        started_at: u64,
    ) -> Result<(), LastFmError>;
}
