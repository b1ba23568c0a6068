//! Discord gateway session and the voice-link surface built on top of it.

use std::sync::{
    Arc,
    atomic::{AtomicI64, AtomicU64, Ordering},
};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};

use crate::{
    common::{
        backoff::Backoff,
        errors::VoiceLinkError,
        types::{AnyResult, ChannelId, GuildId, UserId},
    },
    configs::DiscordConfig,
    protocol::VoiceUpdate,
};

pub mod cache;
pub mod payloads;
pub mod rest;

use cache::VoiceRoster;
use payloads::*;

/// Gateway intents: guilds, voice states, guild messages, message content.
const INTENTS: u64 = (1 << 0) | (1 << 7) | (1 << 9) | (1 << 15);

const GATEWAY_URL: &str = "wss://gateway.discord.gg";
const GATEWAY_VERSION: u8 = 10;
const BACKOFF_BASE_MS: u64 = 1_000;
const MAX_RECONNECT_ATTEMPTS: u32 = 10;
const VOICE_JOIN_TIMEOUT_MS: u64 = 5_000;

/// A prefix command lifted out of MESSAGE_CREATE.
#[derive(Debug)]
pub struct ChatCommand {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub content: String,
}

/// Discord-side voice operations, as consumed by the player manager and
/// the scrobble scheduler. Mocked in tests.
#[async_trait]
pub trait VoiceLink: Send + Sync {
    /// Join (or move within) a guild's voice. Resolves once Discord has
    /// handed out credentials for the node.
    async fn join(
        &self,
        guild_id: &GuildId,
        channel_id: ChannelId,
    ) -> Result<VoiceUpdate, VoiceLinkError>;

    async fn leave(&self, guild_id: &GuildId) -> Result<(), VoiceLinkError>;

    /// Non-bot members currently in the channel.
    fn listeners(&self, guild_id: &GuildId, channel_id: ChannelId) -> Vec<UserId>;

    fn user_channel(&self, guild_id: &GuildId, user_id: UserId) -> Option<ChannelId>;
}

struct PendingJoin {
    session_id: Option<String>,
    server: Option<(String, String)>,
    notify: Option<tokio::sync::oneshot::Sender<VoiceUpdate>>,
}

/// Shared handle onto the live gateway session. The WS sender is swapped
/// on every (re)connect; everything else survives reconnects.
pub struct GatewayHandle {
    user_id: AtomicU64,
    sender: tokio::sync::Mutex<Option<flume::Sender<Message>>>,
    roster: VoiceRoster,
    pending_joins: DashMap<GuildId, PendingJoin>,
}

impl GatewayHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            user_id: AtomicU64::new(0),
            sender: tokio::sync::Mutex::new(None),
            roster: VoiceRoster::new(),
            pending_joins: DashMap::new(),
        })
    }

    pub fn bot_user_id(&self) -> UserId {
        UserId(self.user_id.load(Ordering::Relaxed))
    }

    async fn send_frame(&self, op: u8, d: serde_json::Value) -> Result<(), VoiceLinkError> {
        let frame = GatewayFrame {
            op,
            d,
            s: None,
            t: None,
        };
        let json = serde_json::to_string(&frame).map_err(|_| VoiceLinkError::Disconnected)?;
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(VoiceLinkError::Disconnected)?;
        sender
            .send(Message::Text(json.into()))
            .map_err(|_| VoiceLinkError::Disconnected)
    }

    fn apply_voice_state(&self, state: &VoiceStateData) {
        let Some(guild_id) = state.guild_id.as_deref().map(GuildId::from) else {
            return;
        };
        self.roster.apply(&guild_id, state);

        if state.user_id == self.user_id.load(Ordering::Relaxed) {
            if let Some(mut pending) = self.pending_joins.get_mut(&guild_id) {
                pending.session_id = Some(state.session_id.clone());
            }
            self.try_complete_join(&guild_id);
        }
    }

    fn apply_voice_server(&self, update: &VoiceServerData) {
        let guild_id = GuildId::from(update.guild_id.as_str());
        let Some(endpoint) = &update.endpoint else {
            // Endpoint not allocated yet; a follow-up event completes the join.
            return;
        };
        if let Some(mut pending) = self.pending_joins.get_mut(&guild_id) {
            pending.server = Some((update.token.clone(), endpoint.clone()));
        }
        self.try_complete_join(&guild_id);
    }

    fn try_complete_join(&self, guild_id: &GuildId) {
        let Some(mut pending) = self.pending_joins.get_mut(guild_id) else {
            return;
        };
        let (Some(session_id), Some((token, endpoint))) =
            (pending.session_id.clone(), pending.server.clone())
        else {
            return;
        };
        if let Some(notify) = pending.notify.take() {
            let _ = notify.send(VoiceUpdate {
                token,
                endpoint,
                session_id,
            });
        }
    }
}

#[async_trait]
impl VoiceLink for GatewayHandle {
    async fn join(
        &self,
        guild_id: &GuildId,
        channel_id: ChannelId,
    ) -> Result<VoiceUpdate, VoiceLinkError> {
        let (tx, rx) = tokio::sync::oneshot::channel();

        // The session id can predate the join when this is a channel move.
        let session_id = self.roster.session_id(guild_id, self.bot_user_id());
        self.pending_joins.insert(
            guild_id.clone(),
            PendingJoin {
                session_id,
                server: None,
                notify: Some(tx),
            },
        );

        let result = self
            .send_frame(
                OP_VOICE_STATE_UPDATE,
                json!({
                    "guild_id": guild_id.0,
                    "channel_id": channel_id.to_string(),
                    "self_mute": false,
                    "self_deaf": true,
                }),
            )
            .await;
        if let Err(e) = result {
            self.pending_joins.remove(guild_id);
            return Err(e);
        }

        let timeout = std::time::Duration::from_millis(VOICE_JOIN_TIMEOUT_MS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(update)) => {
                self.pending_joins.remove(guild_id);
                Ok(update)
            }
            _ => {
                self.pending_joins.remove(guild_id);
                Err(VoiceLinkError::Timeout)
            }
        }
    }

    async fn leave(&self, guild_id: &GuildId) -> Result<(), VoiceLinkError> {
        self.pending_joins.remove(guild_id);
        self.send_frame(
            OP_VOICE_STATE_UPDATE,
            json!({
                "guild_id": guild_id.0,
                "channel_id": null,
                "self_mute": false,
                "self_deaf": false,
            }),
        )
        .await
    }

    fn listeners(&self, guild_id: &GuildId, channel_id: ChannelId) -> Vec<UserId> {
        let own = self.bot_user_id();
        self.roster
            .listeners(guild_id, channel_id)
            .into_iter()
            .filter(|u| *u != own)
            .collect()
    }

    fn user_channel(&self, guild_id: &GuildId, user_id: UserId) -> Option<ChannelId> {
        self.roster.user_channel(guild_id, user_id)
    }
}

/// Outcome of a single WS session — tells the outer loop what to do next.
enum SessionOutcome {
    /// Reconnectable disconnect — try to resume.
    Reconnect,
    /// Session invalid — start over with a fresh Identify.
    Identify,
    /// Fatal close — stop entirely.
    Shutdown,
}

/// Close codes that require a fresh Identify instead of a resume.
fn is_reidentify_close(code: u16) -> bool {
    matches!(code, 4007 | 4009)
}

/// Close codes that mean the session is dead and must not be retried:
/// bad token, invalid shard/intents and friends.
fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010..=4014)
}

struct ResumeState {
    session_id: Option<String>,
    resume_url: Option<String>,
    seq: Arc<AtomicI64>,
}

/// The bot's gateway session: identify, heartbeat, dispatch, resume.
pub struct Gateway {
    config: DiscordConfig,
    handle: Arc<GatewayHandle>,
    commands: tokio::sync::mpsc::UnboundedSender<ChatCommand>,
    ready: tokio::sync::Mutex<Option<tokio::sync::oneshot::Sender<UserId>>>,
}

impl Gateway {
    pub fn new(
        config: DiscordConfig,
        handle: Arc<GatewayHandle>,
        commands: tokio::sync::mpsc::UnboundedSender<ChatCommand>,
        ready: tokio::sync::oneshot::Sender<UserId>,
    ) -> Self {
        Self {
            config,
            handle,
            commands,
            ready: tokio::sync::Mutex::new(Some(ready)),
        }
    }

    pub async fn run(self) {
        let mut backoff = Backoff::new(BACKOFF_BASE_MS, MAX_RECONNECT_ATTEMPTS);
        let mut resume = ResumeState {
            session_id: None,
            resume_url: None,
            seq: Arc::new(AtomicI64::new(-1)),
        };

        loop {
            let outcome = self.connect(&mut resume).await;
            *self.handle.sender.lock().await = None;

            match outcome {
                Ok(SessionOutcome::Shutdown) => {
                    error!("Gateway session is fatally closed; giving up");
                    return;
                }
                Ok(SessionOutcome::Reconnect) => {
                    if backoff.is_exhausted() {
                        error!("Max gateway reconnect attempts reached");
                        return;
                    }
                    let delay = backoff.next();
                    debug!("Resuming gateway session in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Ok(SessionOutcome::Identify) => {
                    resume.session_id = None;
                    resume.seq.store(-1, Ordering::Relaxed);
                    if backoff.is_exhausted() {
                        error!("Max gateway re-identify attempts reached");
                        return;
                    }
                    let delay = backoff.next();
                    debug!("Re-identifying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if backoff.is_exhausted() {
                        error!("Gateway connection error after max attempts: {}", e);
                        return;
                    }
                    let delay = backoff.next();
                    warn!("Gateway connection error: {}. Retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn connect(&self, resume: &mut ResumeState) -> AnyResult<SessionOutcome> {
        let base = resume
            .resume_url
            .clone()
            .filter(|_| resume.session_id.is_some())
            .unwrap_or_else(|| GATEWAY_URL.to_string());
        let url = format!("{}/?v={}&encoding=json", base, GATEWAY_VERSION);
        debug!("Connecting to gateway: {}", url);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await?;
        let (mut write, mut read) = ws_stream.split();

        // Write pump; the handle's sender is swapped to this session's tx.
        let (tx, rx) = flume::unbounded::<Message>();
        let write_task = tokio::spawn(async move {
            while let Ok(msg) = rx.recv_async().await {
                if let Err(e) = write.send(msg).await {
                    warn!("Gateway WS write error: {}", e);
                    break;
                }
            }
        });
        *self.handle.sender.lock().await = Some(tx.clone());

        let mut heartbeat_task: Option<tokio::task::JoinHandle<()>> = None;

        let outcome = loop {
            let msg = match read.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    warn!("Gateway WS read error: {}", e);
                    break SessionOutcome::Reconnect;
                }
                None => {
                    debug!("Gateway WS stream ended");
                    break SessionOutcome::Reconnect;
                }
            };

            match msg {
                Message::Text(text) => {
                    let frame: GatewayFrame = match serde_json::from_str(text.as_str()) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Unparseable gateway frame: {}", e);
                            continue;
                        }
                    };
                    if let Some(s) = frame.s {
                        resume.seq.store(s as i64, Ordering::Relaxed);
                    }

                    match frame.op {
                        OP_HELLO => {
                            let hello: Hello = serde_json::from_value(frame.d)?;
                            heartbeat_task =
                                Some(spawn_heartbeat(tx.clone(), resume.seq.clone(), hello.heartbeat_interval));
                            self.send_login(&tx, resume)?;
                        }
                        OP_DISPATCH => {
                            if let Some(t) = frame.t.as_deref() {
                                self.handle_dispatch(t, frame.d, resume).await;
                            }
                        }
                        OP_HEARTBEAT => {
                            let seq = resume.seq.load(Ordering::Relaxed);
                            send_json(&tx, &GatewayFrame {
                                op: OP_HEARTBEAT,
                                d: if seq < 0 { serde_json::Value::Null } else { json!(seq) },
                                s: None,
                                t: None,
                            })?;
                        }
                        OP_RECONNECT => {
                            debug!("Gateway requested reconnect");
                            break SessionOutcome::Reconnect;
                        }
                        OP_INVALID_SESSION => {
                            let resumable = frame.d.as_bool().unwrap_or(false);
                            warn!("Gateway session invalidated (resumable={})", resumable);
                            break if resumable {
                                SessionOutcome::Reconnect
                            } else {
                                SessionOutcome::Identify
                            };
                        }
                        OP_HEARTBEAT_ACK => {}
                        other => debug!("Ignoring gateway op {}", other),
                    }
                }
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1000u16, "no close frame".into()));
                    info!("Gateway WS closed: code={}, reason='{}'", code, reason);

                    if is_fatal_close(code) {
                        break SessionOutcome::Shutdown;
                    }
                    if is_reidentify_close(code) {
                        break SessionOutcome::Identify;
                    }
                    break SessionOutcome::Reconnect;
                }
                _ => {}
            }
        };

        if let Some(task) = heartbeat_task {
            task.abort();
        }
        drop(tx);
        let _ = tokio::time::timeout(std::time::Duration::from_millis(500), write_task).await;

        Ok(outcome)
    }

    fn send_login(&self, tx: &flume::Sender<Message>, resume: &ResumeState) -> AnyResult<()> {
        let frame = if let Some(session_id) = &resume.session_id {
            debug!("Resuming gateway session {}", session_id);
            GatewayFrame {
                op: OP_RESUME,
                d: json!({
                    "token": self.config.token,
                    "session_id": session_id,
                    "seq": resume.seq.load(Ordering::Relaxed),
                }),
                s: None,
                t: None,
            }
        } else {
            GatewayFrame {
                op: OP_IDENTIFY,
                d: json!({
                    "token": self.config.token,
                    "intents": INTENTS,
                    "properties": {
                        "os": std::env::consts::OS,
                        "browser": "groovelink",
                        "device": "groovelink",
                    },
                }),
                s: None,
                t: None,
            }
        };
        send_json(tx, &frame)
    }

    async fn handle_dispatch(&self, kind: &str, d: serde_json::Value, resume: &mut ResumeState) {
        match kind {
            "READY" => {
                let ready: Ready = match serde_json::from_value(d) {
                    Ok(ready) => ready,
                    Err(e) => {
                        warn!("Bad READY payload: {}", e);
                        return;
                    }
                };
                info!("Gateway ready as user {}", ready.user.id);
                self.handle.user_id.store(ready.user.id, Ordering::Relaxed);
                resume.session_id = Some(ready.session_id);
                resume.resume_url = Some(ready.resume_gateway_url);

                if let Some(notify) = self.ready.lock().await.take() {
                    let _ = notify.send(UserId(ready.user.id));
                }
            }
            "RESUMED" => info!("Gateway session resumed"),
            "GUILD_CREATE" => {
                let Ok(guild) = serde_json::from_value::<GuildCreate>(d) else {
                    return;
                };
                let guild_id = GuildId::from(guild.id.as_str());
                for state in &guild.voice_states {
                    self.handle.roster.apply(&guild_id, state);
                }
            }
            "MESSAGE_CREATE" => {
                let Ok(message) = serde_json::from_value::<MessageCreate>(d) else {
                    return;
                };
                let Some(guild_id) = message.guild_id.as_deref().map(GuildId::from) else {
                    return; // DMs carry no guild; nothing to do there
                };
                if message.author.bot || !message.content.starts_with(&self.config.prefix) {
                    return;
                }
                let command = ChatCommand {
                    guild_id,
                    channel_id: ChannelId(message.channel_id),
                    user_id: UserId(message.author.id),
                    content: message.content,
                };
                if self.commands.send(command).is_err() {
                    warn!("Command channel closed; dropping message");
                }
            }
            "VOICE_STATE_UPDATE" => {
                if let Ok(state) = serde_json::from_value::<VoiceStateData>(d) {
                    self.handle.apply_voice_state(&state);
                }
            }
            "VOICE_SERVER_UPDATE" => {
                if let Ok(update) = serde_json::from_value::<VoiceServerData>(d) {
                    self.handle.apply_voice_server(&update);
                }
            }
            _ => {}
        }
    }
}

fn send_json(tx: &flume::Sender<Message>, frame: &GatewayFrame) -> AnyResult<()> {
    let json = serde_json::to_string(frame)?;
    tx.send(Message::Text(json.into()))
        .map_err(|_| "gateway write channel closed".into())
}

fn spawn_heartbeat(
    tx: flume::Sender<Message>,
    seq: Arc<AtomicI64>,
    interval_ms: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(interval_ms));
        // The first tick fires immediately; skip it so heartbeats start one
        // interval after HELLO, as the gateway expects.
        interval.tick().await;
        loop {
            interval.tick().await;
            let current = seq.load(Ordering::Relaxed);
            let frame = GatewayFrame {
                op: OP_HEARTBEAT,
                d: if current < 0 {
                    serde_json::Value::Null
                } else {
                    json!(current)
                },
                s: None,
                t: None,
            };
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if tx.send(Message::Text(json.into())).is_err() {
                break; // Channel closed — session ending
            }
        }
    })
}
