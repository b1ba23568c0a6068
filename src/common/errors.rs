use thiserror::Error;

/// Failures while turning a query or link into a playable track.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The search completed but matched nothing.
    #[error("No results found.")]
    NoResults,

    /// A music-service link was recognized but could not be parsed.
    #[error("Invalid track link.")]
    UnsupportedLink(String),

    /// The search backend failed or returned an error payload.
    #[error("Search failed, try again later.")]
    Backend(String),
}

/// Failures on the playback command path. The `Display` strings double as
/// the user-facing reply, so every variant must read like a chat message.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("You must be in a voice channel.")]
    UserNotInVoice,

    #[error("Not connected.")]
    NotConnected,

    #[error("Nothing is playing.")]
    NothingPlaying,

    #[error("The queue is empty.")]
    QueueEmpty,

    #[error("Failed to connect to voice channel.")]
    VoiceConnect { attempts: u32, reason: String },

    #[error("{0}")]
    Resolve(#[from] ResolveError),

    #[error("Playback error, try again later.")]
    Node(#[from] NodeError),
}

/// Errors talking to the audio node's REST API.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("node request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("node returned status {0}")]
    Status(u16),

    #[error("node session not established yet")]
    NoSession,
}

/// Errors from the Discord-side voice link (join/move/leave).
#[derive(Error, Debug)]
pub enum VoiceLinkError {
    #[error("gateway connection is down")]
    Disconnected,

    #[error("timed out waiting for voice server")]
    Timeout,
}

/// Errors from the Last.fm web service.
#[derive(Error, Debug)]
pub enum LastFmError {
    #[error("lastfm request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lastfm error {code}: {message}")]
    Api { code: i64, message: String },
}

/// Errors from the Discord REST API (message send/edit).
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("discord request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("discord returned status {0}")]
    Status(u16),
}
