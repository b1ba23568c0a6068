use std::{collections::HashMap, sync::Arc, time::Duration};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::{
    common::types::{ChannelId, GuildId, UserId, now_unix_secs},
    gateway::VoiceLink,
    protocol::Track,
    scrobble::{AccountStore, Listen, ProfileService},
};

/// Upper bound on the pre-scrobble wait.
pub const SCROBBLE_CAP_MS: u64 = 30_000;

/// Wait before scrobbling: half the track, capped at 30 seconds.
pub fn scrobble_delay(length_ms: u64) -> Duration {
    Duration::from_millis((length_ms / 2).min(SCROBBLE_CAP_MS))
}

/// Arms one delayed scrobble task per guild and pushes now-playing updates.
///
/// Listeners are snapshotted when a track starts; only users present both at
/// start and at expiry get scrobble credit, so leaving early forfeits it.
pub struct ScrobbleScheduler {
    accounts: Arc<AccountStore>,
    profile: Arc<dyn ProfileService>,
    voice: Arc<dyn VoiceLink>,
    tasks: DashMap<GuildId, tokio::task::JoinHandle<()>>,
}

impl ScrobbleScheduler {
    pub fn new(
        accounts: Arc<AccountStore>,
        profile: Arc<dyn ProfileService>,
        voice: Arc<dyn VoiceLink>,
    ) -> Self {
        Self {
            accounts,
            profile,
            voice,
            tasks: DashMap::new(),
        }
    }

    /// Handle a track start: snapshot the channel, push now-playing updates,
    /// and replace any armed scrobble task for this guild.
    pub fn track_started(&self, guild_id: &GuildId, channel_id: ChannelId, track: &Track) {
        let listeners = self.voice.listeners(guild_id, channel_id);
        let started_at = now_unix_secs();
        let snapshot: HashMap<UserId, u64> =
            listeners.into_iter().map(|u| (u, started_at)).collect();

        debug!(
            "[{}] listening session: {} listener(s) for '{}'",
            guild_id,
            snapshot.len(),
            track.info.title
        );

        let listen = Listen::from_track(track);
        self.announce(snapshot.keys().copied().collect(), listen.clone());

        self.cancel(guild_id);

        // Live streams have no finite length; nothing to scrobble.
        if track.info.is_stream || track.info.length == 0 {
            return;
        }

        let delay = scrobble_delay(track.info.length);
        let guild = guild_id.clone();
        let accounts = self.accounts.clone();
        let profile = self.profile.clone();
        let voice = self.voice.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let present = voice.listeners(&guild, channel_id);
            for (user_id, session_start) in snapshot {
                if !present.contains(&user_id) {
                    debug!("[{}] {} left before scrobble point; skipping", guild, user_id);
                    continue;
                }
                let Some(account) = accounts.get(user_id) else {
                    debug!("[{}] {} has no linked Last.fm account", guild, user_id);
                    continue;
                };
                if let Err(e) = profile
                    .scrobble(&account.session_key, &listen, session_start)
                    .await
                {
                    warn!("[{}] scrobble failed for {}: {}", guild, account.username, e);
                }
            }
        });

        self.tasks.insert(guild_id.clone(), task);
    }

    /// Drop the armed scrobble task, if any. Called on track end and on
    /// disconnect; a cancelled task never fires.
    pub fn cancel(&self, guild_id: &GuildId) {
        if let Some((_, task)) = self.tasks.remove(guild_id) {
            task.abort();
        }
    }

    /// Push a now-playing update to every linked listener in the snapshot.
    /// Fire-and-forget: failures are logged and never reach playback.
    fn announce(&self, listeners: Vec<UserId>, listen: Listen) {
        let accounts = self.accounts.clone();
        let profile = self.profile.clone();

        tokio::spawn(async move {
            for user_id in listeners {
                let Some(account) = accounts.get(user_id) else {
                    continue;
                };
                if let Err(e) = profile.update_now_playing(&account.session_key, &listen).await {
                    warn!("now-playing update failed for {}: {}", account.username, e);
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
