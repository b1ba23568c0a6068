use std::collections::HashMap;

use dashmap::DashMap;

use crate::{
    common::types::{ChannelId, GuildId, UserId},
    gateway::payloads::VoiceStateData,
};

#[derive(Debug, Clone)]
struct Seat {
    channel: ChannelId,
    is_bot: bool,
    session_id: String,
}

/// Who is in which voice channel, per guild. Fed by VOICE_STATE_UPDATE
/// dispatches and seeded from GUILD_CREATE.
#[derive(Default)]
pub struct VoiceRoster {
    guilds: DashMap<GuildId, HashMap<UserId, Seat>>,
}

impl VoiceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, guild_id: &GuildId, state: &VoiceStateData) {
        let mut guild = self.guilds.entry(guild_id.clone()).or_default();
        match state.channel_id {
            Some(channel) => {
                guild.insert(
                    UserId(state.user_id),
                    Seat {
                        channel: ChannelId(channel),
                        is_bot: state.is_bot(),
                        session_id: state.session_id.clone(),
                    },
                );
            }
            None => {
                guild.remove(&UserId(state.user_id));
            }
        }
    }

    /// Non-bot members currently in `channel`.
    ///
    /// GUILD_CREATE voice states carry no member object, so another bot
    /// can be miscounted as a listener until its next state update.
    pub fn listeners(&self, guild_id: &GuildId, channel: ChannelId) -> Vec<UserId> {
        self.guilds
            .get(guild_id)
            .map(|guild| {
                guild
                    .iter()
                    .filter(|(_, seat)| seat.channel == channel && !seat.is_bot)
                    .map(|(user, _)| *user)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn user_channel(&self, guild_id: &GuildId, user_id: UserId) -> Option<ChannelId> {
        self.guilds
            .get(guild_id)
            .and_then(|guild| guild.get(&user_id).map(|seat| seat.channel))
    }

    pub fn session_id(&self, guild_id: &GuildId, user_id: UserId) -> Option<String> {
        self.guilds
            .get(guild_id)
            .and_then(|guild| guild.get(&user_id).map(|seat| seat.session_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn state(user_id: u64, channel_id: Option<u64>, bot: bool) -> VoiceStateData {
        serde_json::from_value(serde_json::json!({
            "guild_id": "g",
            "channel_id": channel_id.map(|c| c.to_string()),
            "user_id": user_id.to_string(),
            "session_id": format!("session-{}", user_id),
            "member": {"user": {"id": user_id.to_string(), "bot": bot}}
        }))
        .unwrap()
    }

    #[test]
    fn test_join_move_leave() {
        let roster = VoiceRoster::new();
        let guild = GuildId::from("g");

        roster.apply(&guild, &state(1, Some(10), false));
        assert_eq!(roster.user_channel(&guild, UserId(1)), Some(ChannelId(10)));

        roster.apply(&guild, &state(1, Some(20), false));
        assert_eq!(roster.user_channel(&guild, UserId(1)), Some(ChannelId(20)));
        assert!(roster.listeners(&guild, ChannelId(10)).is_empty());

        roster.apply(&guild, &state(1, None, false));
        assert_eq!(roster.user_channel(&guild, UserId(1)), None);
    }

    #[test]
    fn test_listeners_exclude_bots_and_other_channels() {
        let roster = VoiceRoster::new();
        let guild = GuildId::from("g");

        roster.apply(&guild, &state(1, Some(10), false));
        roster.apply(&guild, &state(2, Some(10), true));
        roster.apply(&guild, &state(3, Some(11), false));

        let mut listeners = roster.listeners(&guild, ChannelId(10));
        listeners.sort();
        assert_eq!(listeners, vec![UserId(1)]);
    }

    #[test]
    fn test_session_id_tracked_per_user() {
        let roster = VoiceRoster::new();
        let guild = GuildId::from("g");
        roster.apply(&guild, &state(7, Some(10), false));
        assert_eq!(
            roster.session_id(&guild, UserId(7)).as_deref(),
            Some("session-7")
        );
    }

    #[test]
    fn test_unknown_guild_is_empty() {
        let roster = VoiceRoster::new();
        assert!(roster.listeners(&GuildId::from("none"), ChannelId(1)).is_empty());
        assert_eq!(roster.user_channel(&GuildId::from("none"), UserId(1)), None);
    }
}
