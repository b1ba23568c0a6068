use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One gateway frame, either direction.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    /// Always serialized: heartbeats carry an explicit `"d": null`.
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_VOICE_STATE_UPDATE: u8 = 4;
pub const OP_RESUME: u8 = 6;
pub const OP_RECONNECT: u8 = 7;
pub const OP_INVALID_SESSION: u8 = 9;
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;

/// Snowflakes arrive as decimal strings; accept raw numbers too.
fn snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    match value {
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("expected unsigned snowflake")),
        _ => Err(serde::de::Error::custom("expected string or number")),
    }
}

fn snowflake_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::String(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected unsigned snowflake")),
        _ => Err(serde::de::Error::custom("expected string, number or null")),
    }
}

#[derive(Debug, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
pub struct Ready {
    pub session_id: String,
    pub resume_gateway_url: String,
    pub user: UserRef,
}

#[derive(Debug, Deserialize)]
pub struct UserRef {
    #[serde(deserialize_with = "snowflake")]
    pub id: u64,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(deserialize_with = "snowflake")]
    pub channel_id: u64,
    #[serde(default)]
    pub content: String,
    pub author: UserRef,
}

#[derive(Debug, Deserialize)]
pub struct VoiceStateData {
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default, deserialize_with = "snowflake_opt")]
    pub channel_id: Option<u64>,
    #[serde(deserialize_with = "snowflake")]
    pub user_id: u64,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub member: Option<MemberRef>,
}

impl VoiceStateData {
    pub fn is_bot(&self) -> bool {
        self.member.as_ref().map(|m| m.user.bot).unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
pub struct MemberRef {
    pub user: UserRef,
}

#[derive(Debug, Deserialize)]
pub struct VoiceServerData {
    pub token: String,
    pub guild_id: String,
    /// `None` while Discord reallocates the voice server; a follow-up
    /// event delivers the final endpoint.
    pub endpoint: Option<String>,
}

/// The slice of GUILD_CREATE this bot cares about: seeding the voice roster.
#[derive(Debug, Deserialize)]
pub struct GuildCreate {
    pub id: String,
    #[serde(default)]
    pub voice_states: Vec<VoiceStateData>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_serializes_without_empty_dispatch_fields() {
        let frame = GatewayFrame {
            op: OP_HEARTBEAT,
            d: serde_json::json!(42),
            s: None,
            t: None,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"op":1,"d":42}"#);

        let null_heartbeat = GatewayFrame {
            op: OP_HEARTBEAT,
            d: Value::Null,
            s: None,
            t: None,
        };
        let json = serde_json::to_string(&null_heartbeat).unwrap();
        assert_eq!(json, r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn test_dispatch_frame_parses() {
        let json = r#"{"op":0,"d":{"content":"hi"},"s":12,"t":"MESSAGE_CREATE"}"#;
        let frame: GatewayFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.op, OP_DISPATCH);
        assert_eq!(frame.s, Some(12));
        assert_eq!(frame.t.as_deref(), Some("MESSAGE_CREATE"));
    }

    #[test]
    fn test_voice_state_parses_with_member() {
        let json = serde_json::json!({
            "guild_id": "81384788765712384",
            "channel_id": "159985870458322944",
            "user_id": "80351110224678912",
            "session_id": "8d829ba4f1af5f50c2b8f1b23a",
            "member": {"user": {"id": "80351110224678912", "bot": true}}
        });
        let state: VoiceStateData = serde_json::from_value(json).unwrap();
        assert_eq!(state.channel_id, Some(159985870458322944));
        assert_eq!(state.user_id, 80351110224678912);
        assert!(state.is_bot());
    }

    #[test]
    fn test_voice_state_null_channel_means_left() {
        let json = serde_json::json!({
            "guild_id": "1",
            "channel_id": null,
            "user_id": "2",
            "session_id": "s"
        });
        let state: VoiceStateData = serde_json::from_value(json).unwrap();
        assert_eq!(state.channel_id, None);
        assert!(!state.is_bot());
    }

    #[test]
    fn test_message_create_parses() {
        let json = serde_json::json!({
            "guild_id": "1",
            "channel_id": "2",
            "content": ",play something",
            "author": {"id": "3", "bot": false}
        });
        let msg: MessageCreate = serde_json::from_value(json).unwrap();
        assert_eq!(msg.channel_id, 2);
        assert_eq!(msg.author.id, 3);
        assert_eq!(msg.content, ",play something");
    }
}
