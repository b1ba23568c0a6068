//! Client for the Lavalink-compatible audio node: REST control surface plus
//! the WebSocket event stream.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::{errors::NodeError, types::GuildId},
    protocol::{LoadResult, VoiceUpdate},
};

pub mod rest;
pub mod socket;

pub use rest::NodeRest;
pub use socket::NodeSocket;

/// Control surface of the audio node, as used by the player manager.
///
/// Kept behind a trait so playback logic can be exercised against a mock
/// node in tests.
#[async_trait]
pub trait AudioApi: Send + Sync {
    /// Resolve an identifier (`ytsearch:...`, a URL, ...) into tracks.
    async fn load_tracks(&self, identifier: &str) -> Result<LoadResult, NodeError>;

    /// Start (or replace) playback of an encoded track.
    async fn play(&self, guild_id: &GuildId, encoded: &str) -> Result<(), NodeError>;

    /// Stop the current track without destroying the player.
    async fn stop(&self, guild_id: &GuildId) -> Result<(), NodeError>;

    async fn set_paused(&self, guild_id: &GuildId, paused: bool) -> Result<(), NodeError>;

    /// Forward gateway voice credentials to the node player.
    async fn submit_voice(&self, guild_id: &GuildId, voice: &VoiceUpdate) -> Result<(), NodeError>;

    /// Destroy the node-side player entirely.
    async fn destroy(&self, guild_id: &GuildId) -> Result<(), NodeError>;
}

/// Node session id, shared between the socket (which learns it from the
/// `ready` op) and the REST client (which embeds it in player paths).
#[derive(Clone, Default)]
pub struct SessionSlot(Arc<parking_lot::RwLock<Option<String>>>);

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session_id: String) {
        *self.0.write() = Some(session_id);
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().clone()
    }
}
