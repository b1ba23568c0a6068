use std::time::{Duration, Instant};

use crate::{
    common::types::{ChannelId, GuildId, MessageId},
    player::{loop_mode::LoopMode, queue::TrackQueue},
    protocol::Track,
};

/// All per-guild voice state. One instance per guild, owned by the
/// manager's registry and locked for the duration of each operation.
pub struct GuildPlayer {
    pub guild_id: GuildId,
    /// Voice channel the session is bound to. `None` means disconnected.
    pub channel_id: Option<ChannelId>,
    /// Text channel of the last play command; status messages go here.
    pub text_channel: Option<ChannelId>,
    pub queue: TrackQueue,
    pub loop_mode: LoopMode,
    pub current: Option<Track>,
    pub paused: bool,
    /// Most recent status message, for edit-in-place updates.
    pub now_playing_msg: Option<(ChannelId, MessageId)>,
    /// When the voice channel was first observed with zero listeners.
    pub empty_since: Option<Instant>,
}

impl GuildPlayer {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            channel_id: None,
            text_channel: None,
            queue: TrackQueue::new(),
            loop_mode: LoopMode::Off,
            current: None,
            paused: false,
            now_playing_msg: None,
            empty_since: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }

    /// Clear everything derived from the session. Called on disconnect,
    /// which is the canonical cleanup point.
    pub fn reset(&mut self) {
        self.channel_id = None;
        self.queue.clear();
        self.loop_mode = LoopMode::Off;
        self.current = None;
        self.paused = false;
        self.now_playing_msg = None;
        self.empty_since = None;
    }

    /// Feed one occupancy observation from the idle sweep. Returns `true`
    /// once the channel has been continuously empty for `threshold`.
    ///
    /// Level-triggered: a missed sweep tick cannot postpone the disconnect
    /// because elapsed wall-clock time is what is compared.
    pub fn observe_occupancy(&mut self, listeners: usize, now: Instant, threshold: Duration) -> bool {
        if listeners > 0 {
            self.empty_since = None;
            return false;
        }
        let since = *self.empty_since.get_or_insert(now);
        now.duration_since(since) >= threshold
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
