use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::{
    common::{
        errors::PlaybackError,
        types::{ChannelId, GuildId, Shared, UserId},
    },
    configs::PlayerConfig,
    gateway::{VoiceLink, rest::ChatApi},
    node::AudioApi,
    player::{
        context::GuildPlayer,
        loop_mode::{LoopMode, next_track},
    },
    protocol::{NodeEvent, Track, TrackEndReason},
    resolver::TrackResolver,
    scrobble::ScrobbleScheduler,
};

/// Result of a play command.
pub enum PlayOutcome {
    /// Playback started immediately.
    Started(Track),
    /// Something was already playing; the track went to the queue.
    Queued { track: Track, position: usize },
}

/// Owns every guild's voice session and routes node events to it.
pub struct PlayerManager {
    players: DashMap<GuildId, Shared<GuildPlayer>>,
    node: Arc<dyn AudioApi>,
    voice: Arc<dyn VoiceLink>,
    chat: Arc<dyn ChatApi>,
    resolver: Arc<TrackResolver>,
    scrobbler: Arc<ScrobbleScheduler>,
    config: PlayerConfig,
}

impl PlayerManager {
    pub fn new(
        node: Arc<dyn AudioApi>,
        voice: Arc<dyn VoiceLink>,
        chat: Arc<dyn ChatApi>,
        resolver: Arc<TrackResolver>,
        scrobbler: Arc<ScrobbleScheduler>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            players: DashMap::new(),
            node,
            voice,
            chat,
            resolver,
            scrobbler,
            config,
        }
    }

    pub fn idle_sweep_period(&self) -> Duration {
        Duration::from_secs(self.config.idle_sweep_secs)
    }

    fn player(&self, guild_id: &GuildId) -> Shared<GuildPlayer> {
        self.players
            .entry(guild_id.clone())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(GuildPlayer::new(guild_id.clone())))
            })
            .clone()
    }

    fn existing(&self, guild_id: &GuildId) -> Result<Shared<GuildPlayer>, PlaybackError> {
        self.players
            .get(guild_id)
            .map(|e| e.value().clone())
            .ok_or(PlaybackError::NotConnected)
    }

    /// Handle a play command: join the user's channel, resolve the query,
    /// then either start playback or append to the queue.
    pub async fn play(
        &self,
        guild_id: &GuildId,
        user_id: UserId,
        text_channel: ChannelId,
        query: &str,
    ) -> Result<PlayOutcome, PlaybackError> {
        let channel = self
            .voice
            .user_channel(guild_id, user_id)
            .ok_or(PlaybackError::UserNotInVoice)?;

        self.connect(guild_id, channel).await?;

        let track = self.resolver.resolve(query).await?;

        let player = self.player(guild_id);
        let mut p = player.lock().await;
        p.text_channel = Some(text_channel);

        if p.current.is_some() {
            p.queue.enqueue(track.clone());
            let position = p.queue.len();
            debug!("[{}] queued '{}' at {}", guild_id, track.info.title, position);
            Ok(PlayOutcome::Queued { track, position })
        } else {
            self.node.play(guild_id, &track.encoded).await?;
            p.current = Some(track.clone());
            p.paused = false;
            Ok(PlayOutcome::Started(track))
        }
    }

    /// Join (or move to) `channel`. Idempotent for the already-bound
    /// channel; bounded retries, and a failure leaves no session behind.
    pub async fn connect(
        &self,
        guild_id: &GuildId,
        channel: ChannelId,
    ) -> Result<(), PlaybackError> {
        let player = self.player(guild_id);
        let mut p = player.lock().await;

        if p.channel_id == Some(channel) {
            return Ok(());
        }
        if let Some(previous) = p.channel_id {
            info!("[{}] moving voice session {} -> {}", guild_id, previous, channel);
        }

        let mut last_error = String::new();
        for attempt in 1..=self.config.connect_attempts {
            match self.voice.join(guild_id, channel).await {
                Ok(voice_update) => {
                    if let Err(e) = self.node.submit_voice(guild_id, &voice_update).await {
                        last_error = e.to_string();
                    } else {
                        p.channel_id = Some(channel);
                        p.empty_since = None;
                        info!("[{}] voice session bound to {}", guild_id, channel);
                        return Ok(());
                    }
                }
                Err(e) => last_error = e.to_string(),
            }
            warn!(
                "[{}] voice connect attempt {}/{} failed: {}",
                guild_id, attempt, self.config.connect_attempts, last_error
            );
            if attempt < self.config.connect_attempts {
                tokio::time::sleep(Duration::from_millis(self.config.connect_backoff_ms)).await;
            }
        }

        // No partial state survives a failed connect.
        p.reset();
        drop(p);
        self.players.remove(guild_id);

        Err(PlaybackError::VoiceConnect {
            attempts: self.config.connect_attempts,
            reason: last_error,
        })
    }

    /// Skip the current track: play the next queued one, or stop when the
    /// queue is empty. Skipping bypasses loop mode on purpose.
    pub async fn skip(&self, guild_id: &GuildId) -> Result<Track, PlaybackError> {
        let player = self.existing(guild_id)?;
        let mut p = player.lock().await;
        let skipped = p.current.take().ok_or(PlaybackError::NothingPlaying)?;

        self.scrobbler.cancel(guild_id);

        match p.queue.dequeue_next() {
            Some(next) => {
                self.node.play(guild_id, &next.encoded).await?;
                p.current = Some(next);
            }
            None => {
                self.node.stop(guild_id).await?;
            }
        }
        Ok(skipped)
    }

    /// Explicit stop command: full disconnect.
    pub async fn stop(&self, guild_id: &GuildId) -> Result<(), PlaybackError> {
        self.existing(guild_id)?;
        self.disconnect(guild_id).await;
        Ok(())
    }

    /// Tear down a guild's session completely. Background paths call this
    /// too, so every failure is logged rather than returned.
    pub async fn disconnect(&self, guild_id: &GuildId) {
        self.scrobbler.cancel(guild_id);

        if let Err(e) = self.voice.leave(guild_id).await {
            warn!("[{}] voice leave failed: {}", guild_id, e);
        }
        if let Err(e) = self.node.destroy(guild_id).await {
            warn!("[{}] node player destroy failed: {}", guild_id, e);
        }
        if let Some((_, player)) = self.players.remove(guild_id) {
            player.lock().await.reset();
        }
        info!("[{}] voice session torn down", guild_id);
    }

    pub async fn toggle_loop(&self, guild_id: &GuildId) -> Result<LoopMode, PlaybackError> {
        let player = self.existing(guild_id)?;
        let mut p = player.lock().await;
        p.loop_mode = p.loop_mode.toggle();
        Ok(p.loop_mode)
    }

    pub async fn shuffle(&self, guild_id: &GuildId) -> Result<usize, PlaybackError> {
        let player = self.existing(guild_id)?;
        let mut p = player.lock().await;
        if p.queue.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        p.queue.shuffle();
        Ok(p.queue.len())
    }

    pub async fn clear(&self, guild_id: &GuildId) -> Result<usize, PlaybackError> {
        let player = self.existing(guild_id)?;
        let mut p = player.lock().await;
        let dropped = p.queue.len();
        p.queue.clear();
        Ok(dropped)
    }

    pub async fn set_paused(&self, guild_id: &GuildId, paused: bool) -> Result<(), PlaybackError> {
        let player = self.existing(guild_id)?;
        let mut p = player.lock().await;
        if p.current.is_none() {
            return Err(PlaybackError::NothingPlaying);
        }
        self.node.set_paused(guild_id, paused).await?;
        p.paused = paused;
        Ok(())
    }

    /// Current track plus a snapshot of the queued ones, for the queue view.
    pub async fn queue_view(
        &self,
        guild_id: &GuildId,
    ) -> Result<(Option<Track>, Vec<Track>), PlaybackError> {
        let player = self.existing(guild_id)?;
        let p = player.lock().await;
        Ok((p.current.clone(), p.queue.iter().cloned().collect()))
    }

    // -- Node event handling ------------------------------------------------

    pub async fn handle_node_event(&self, event: NodeEvent) {
        match event {
            NodeEvent::TrackStart { guild_id, track } => {
                self.on_track_start(&guild_id, track).await;
            }
            NodeEvent::TrackEnd {
                guild_id,
                track,
                reason,
            } => {
                self.on_track_end(&guild_id, track, reason).await;
            }
            NodeEvent::TrackException {
                guild_id,
                track,
                exception,
            } => {
                // No auto-skip: surfaced in logs only.
                error!(
                    "[{}] track exception on '{}': {} ({})",
                    guild_id,
                    track.info.title,
                    exception.message.as_deref().unwrap_or("no message"),
                    exception.cause
                );
            }
            NodeEvent::TrackStuck {
                guild_id,
                track,
                threshold_ms,
            } => {
                warn!(
                    "[{}] track stuck on '{}' (threshold {}ms)",
                    guild_id, track.info.title, threshold_ms
                );
            }
            NodeEvent::WebSocketClosed {
                guild_id,
                code,
                reason,
                by_remote,
            } => {
                warn!(
                    "[{}] voice websocket closed: code={} reason='{}' by_remote={}",
                    guild_id, code, reason, by_remote
                );
            }
        }
    }

    async fn on_track_start(&self, guild_id: &GuildId, track: Track) {
        let Ok(player) = self.existing(guild_id) else {
            debug!("[{}] track start for unknown guild; ignoring", guild_id);
            return;
        };
        let mut p = player.lock().await;
        let Some(channel) = p.channel_id else {
            return;
        };

        p.current = Some(track.clone());

        self.scrobbler.track_started(guild_id, channel, &track);

        let content = format!(
            "Now playing: **{}** — {}",
            track.info.title, track.info.author
        );
        self.update_status_message(&mut p, &content).await;
    }

    async fn on_track_end(&self, guild_id: &GuildId, track: Track, reason: TrackEndReason) {
        debug!(
            "[{}] track ended: '{}' ({:?})",
            guild_id, track.info.title, reason
        );
        self.scrobbler.cancel(guild_id);

        let Ok(player) = self.existing(guild_id) else {
            return;
        };
        let mut p = player.lock().await;

        if !reason.may_start_next() {
            // Replaced/stopped/cleanup: whatever comes next was already
            // decided by the operation that ended this track.
            return;
        }

        // A track that failed to load must not loop back onto itself.
        let mode = if reason == TrackEndReason::LoadFailed {
            LoopMode::Off
        } else {
            p.loop_mode
        };

        match next_track(mode, track, &mut p.queue) {
            Some(next) => {
                if let Err(e) = self.node.play(guild_id, &next.encoded).await {
                    error!("[{}] failed to start next track: {}", guild_id, e);
                    p.current = None;
                    return;
                }
                p.current = Some(next);
            }
            None => {
                // Queue exhausted: go idle but stay in the channel.
                p.current = None;
            }
        }
    }

    /// Edit the stored status message in place, falling back to sending a
    /// fresh one when the edit fails or no message exists yet.
    async fn update_status_message(&self, p: &mut GuildPlayer, content: &str) {
        if let Some((channel, message)) = p.now_playing_msg {
            if self.chat.edit_message(channel, message, content).await.is_ok() {
                return;
            }
        }
        let Some(text_channel) = p.text_channel else {
            return;
        };
        match self.chat.send_message(text_channel, content).await {
            Ok(message_id) => p.now_playing_msg = Some((text_channel, message_id)),
            Err(e) => warn!("[{}] status message send failed: {}", p.guild_id, e),
        }
    }

    // -- Idle sweep ---------------------------------------------------------

    /// One pass of the idle monitor over every connected guild.
    pub async fn sweep_idle(&self) {
        let now = Instant::now();
        let threshold = Duration::from_secs(self.config.idle_threshold_secs);

        let snapshot: Vec<(GuildId, Shared<GuildPlayer>)> = self
            .players
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut idle = Vec::new();
        for (guild_id, player) in snapshot {
            let mut p = player.lock().await;
            let Some(channel) = p.channel_id else {
                continue;
            };
            let listeners = self.voice.listeners(&guild_id, channel).len();
            if p.observe_occupancy(listeners, now, threshold) {
                idle.push(guild_id);
            }
        }

        for guild_id in idle {
            info!("[{}] voice channel empty past threshold; leaving", guild_id);
            self.disconnect(&guild_id).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{
        Mutex,
        atomic::{AtomicU32, AtomicU64, Ordering as AtomicOrdering},
    };

    use crate::{
        common::errors::{ChatError, LastFmError, NodeError, VoiceLinkError},
        common::types::MessageId,
        protocol::{LoadResult, NodeEvent, TrackInfo, VoiceUpdate},
        scrobble::{AccountStore, Listen, ProfileService, ScrobbleScheduler},
    };

    #[derive(Default)]
    struct MockNode {
        played: Mutex<Vec<(String, String)>>,
        stopped: Mutex<Vec<String>>,
        destroyed: Mutex<Vec<String>>,
        voices: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AudioApi for MockNode {
        async fn load_tracks(&self, identifier: &str) -> Result<LoadResult, NodeError> {
            let query = identifier.strip_prefix("ytsearch:").unwrap_or(identifier);
            Ok(LoadResult::Search(vec![Track {
                encoded: format!("enc:{}", query),
                info: TrackInfo {
                    title: query.to_string(),
                    author: "someone".into(),
                    length: 120_000,
                    source_name: "youtube".into(),
                    ..TrackInfo::default()
                },
                plugin_info: serde_json::json!({}),
                user_data: serde_json::json!({}),
            }]))
        }

        async fn play(&self, guild_id: &GuildId, encoded: &str) -> Result<(), NodeError> {
            self.played
                .lock()
                .unwrap()
                .push((guild_id.0.clone(), encoded.to_string()));
            Ok(())
        }

        async fn stop(&self, guild_id: &GuildId) -> Result<(), NodeError> {
            self.stopped.lock().unwrap().push(guild_id.0.clone());
            Ok(())
        }

        async fn set_paused(&self, _guild_id: &GuildId, _paused: bool) -> Result<(), NodeError> {
            Ok(())
        }

        async fn submit_voice(
            &self,
            guild_id: &GuildId,
            _voice: &VoiceUpdate,
        ) -> Result<(), NodeError> {
            self.voices.lock().unwrap().push(guild_id.0.clone());
            Ok(())
        }

        async fn destroy(&self, guild_id: &GuildId) -> Result<(), NodeError> {
            self.destroyed.lock().unwrap().push(guild_id.0.clone());
            Ok(())
        }
    }

    struct MockVoice {
        fail_joins: bool,
        join_attempts: AtomicU32,
        leaves: Mutex<Vec<String>>,
        members: Mutex<Vec<UserId>>,
    }

    impl MockVoice {
        fn new(fail_joins: bool) -> Self {
            Self {
                fail_joins,
                join_attempts: AtomicU32::new(0),
                leaves: Mutex::new(Vec::new()),
                members: Mutex::new(vec![UserId(7)]),
            }
        }

        fn set_members(&self, members: Vec<UserId>) {
            *self.members.lock().unwrap() = members;
        }
    }

    #[async_trait]
    impl VoiceLink for MockVoice {
        async fn join(
            &self,
            _guild_id: &GuildId,
            _channel_id: ChannelId,
        ) -> Result<VoiceUpdate, VoiceLinkError> {
            self.join_attempts.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail_joins {
                return Err(VoiceLinkError::Timeout);
            }
            Ok(VoiceUpdate {
                token: "token".into(),
                endpoint: "endpoint".into(),
                session_id: "session".into(),
            })
        }

        async fn leave(&self, guild_id: &GuildId) -> Result<(), VoiceLinkError> {
            self.leaves.lock().unwrap().push(guild_id.0.clone());
            Ok(())
        }

        fn listeners(&self, _guild_id: &GuildId, _channel_id: ChannelId) -> Vec<UserId> {
            self.members.lock().unwrap().clone()
        }

        fn user_channel(&self, _guild_id: &GuildId, _user_id: UserId) -> Option<ChannelId> {
            Some(ChannelId(100))
        }
    }

    #[derive(Default)]
    struct MockChat {
        sent: Mutex<Vec<(u64, String)>>,
        edited: Mutex<Vec<(u64, u64, String)>>,
        next_id: AtomicU64,
    }

    #[async_trait]
    impl ChatApi for MockChat {
        async fn send_message(
            &self,
            channel: ChannelId,
            content: &str,
        ) -> Result<MessageId, ChatError> {
            self.sent.lock().unwrap().push((channel.0, content.to_string()));
            Ok(MessageId(self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1))
        }

        async fn edit_message(
            &self,
            channel: ChannelId,
            message: MessageId,
            content: &str,
        ) -> Result<(), ChatError> {
            self.edited
                .lock()
                .unwrap()
                .push((channel.0, message.0, content.to_string()));
            Ok(())
        }
    }

    struct NullProfile;

    #[async_trait]
    impl ProfileService for NullProfile {
        async fn update_now_playing(
            &self,
            _session_key: &str,
            _listen: &Listen,
        ) -> Result<(), LastFmError> {
            Ok(())
        }

        async fn scrobble(
            &self,
            _session_key: &str,
            _listen: &Listen,
            _started_at: u64,
        ) -> Result<(), LastFmError> {
            Ok(())
        }
    }

    struct Fixture {
        manager: Arc<PlayerManager>,
        node: Arc<MockNode>,
        voice: Arc<MockVoice>,
        chat: Arc<MockChat>,
    }

    fn fixture_with(voice: Arc<MockVoice>, config: PlayerConfig) -> Fixture {
        let node = Arc::new(MockNode::default());
        let chat = Arc::new(MockChat::default());
        let resolver = Arc::new(TrackResolver::new(node.clone(), reqwest::Client::new()));
        let scrobbler = Arc::new(ScrobbleScheduler::new(
            Arc::new(AccountStore::default()),
            Arc::new(NullProfile),
            voice.clone(),
        ));
        let manager = Arc::new(PlayerManager::new(
            node.clone(),
            voice.clone(),
            chat.clone(),
            resolver,
            scrobbler,
            config,
        ));
        Fixture {
            manager,
            node,
            voice,
            chat,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            Arc::new(MockVoice::new(false)),
            PlayerConfig {
                connect_backoff_ms: 5,
                ..PlayerConfig::default()
            },
        )
    }

    fn guild() -> GuildId {
        GuildId::from("81384788765712384")
    }

    fn finished(track: Track) -> NodeEvent {
        NodeEvent::TrackEnd {
            guild_id: guild(),
            track,
            reason: TrackEndReason::Finished,
        }
    }

    async fn start_playing(f: &Fixture, query: &str) -> Track {
        match f
            .manager
            .play(&guild(), UserId(7), ChannelId(1), query)
            .await
            .unwrap()
        {
            PlayOutcome::Started(track) => track,
            PlayOutcome::Queued { track, .. } => track,
        }
    }

    #[tokio::test]
    async fn test_connect_failure_retries_and_leaves_no_session() {
        let f = fixture_with(
            Arc::new(MockVoice::new(true)),
            PlayerConfig {
                connect_backoff_ms: 5,
                ..PlayerConfig::default()
            },
        );

        let result = f.manager.play(&guild(), UserId(7), ChannelId(1), "song").await;
        match result {
            Err(PlaybackError::VoiceConnect { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected VoiceConnect error, got {:?}", other.err()),
        }

        assert_eq!(f.voice.join_attempts.load(AtomicOrdering::SeqCst), 3);
        // No session object is retained after a failed connect.
        assert!(matches!(
            f.manager.queue_view(&guild()).await,
            Err(PlaybackError::NotConnected)
        ));
        assert!(f.node.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_play_starts_then_queues() {
        let f = fixture();

        let outcome = f
            .manager
            .play(&guild(), UserId(7), ChannelId(1), "first song")
            .await
            .unwrap();
        assert!(matches!(outcome, PlayOutcome::Started(_)));
        assert_eq!(f.node.played.lock().unwrap().len(), 1);
        assert_eq!(f.node.voices.lock().unwrap().len(), 1);

        let outcome = f
            .manager
            .play(&guild(), UserId(7), ChannelId(1), "second song")
            .await
            .unwrap();
        match outcome {
            PlayOutcome::Queued { position, .. } => assert_eq!(position, 1),
            _ => panic!("expected queued outcome"),
        }
        // Still only the first track was sent to the node.
        assert_eq!(f.node.played.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_clears_everything() {
        let f = fixture();
        start_playing(&f, "first").await;
        start_playing(&f, "second").await;
        f.manager.toggle_loop(&guild()).await.unwrap();

        f.manager.stop(&guild()).await.unwrap();

        assert_eq!(f.voice.leaves.lock().unwrap().as_slice(), &[guild().0.clone()]);
        assert_eq!(f.node.destroyed.lock().unwrap().len(), 1);
        assert!(matches!(
            f.manager.queue_view(&guild()).await,
            Err(PlaybackError::NotConnected)
        ));
        // A second stop has nothing to act on.
        assert!(matches!(
            f.manager.stop(&guild()).await,
            Err(PlaybackError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_track_end_advances_queue_in_order() {
        let f = fixture();
        let a = start_playing(&f, "a").await;
        start_playing(&f, "b").await;
        start_playing(&f, "c").await;

        f.manager.handle_node_event(finished(a)).await;

        let (current, upcoming) = f.manager.queue_view(&guild()).await.unwrap();
        assert_eq!(current.unwrap().info.title, "b");
        let titles: Vec<String> = upcoming.iter().map(|t| t.info.title.clone()).collect();
        assert_eq!(titles, vec!["c"]);
        assert_eq!(f.node.played.lock().unwrap().last().unwrap().1, "enc:b");
    }

    #[tokio::test]
    async fn test_track_end_loop_all_requeues() {
        let f = fixture();
        let a = start_playing(&f, "a").await;
        start_playing(&f, "b").await;
        // off -> one -> all
        f.manager.toggle_loop(&guild()).await.unwrap();
        f.manager.toggle_loop(&guild()).await.unwrap();

        f.manager.handle_node_event(finished(a)).await;

        let (current, upcoming) = f.manager.queue_view(&guild()).await.unwrap();
        assert_eq!(current.unwrap().info.title, "b");
        let titles: Vec<String> = upcoming.iter().map(|t| t.info.title.clone()).collect();
        assert_eq!(titles, vec!["a"]);
    }

    #[tokio::test]
    async fn test_track_end_loop_one_replays() {
        let f = fixture();
        let a = start_playing(&f, "a").await;
        start_playing(&f, "b").await;
        f.manager.toggle_loop(&guild()).await.unwrap();

        f.manager.handle_node_event(finished(a.clone())).await;

        let (current, upcoming) = f.manager.queue_view(&guild()).await.unwrap();
        assert_eq!(current.unwrap().info.title, "a");
        assert_eq!(upcoming.len(), 1, "queue must be untouched in loop-one");
        assert_eq!(f.node.played.lock().unwrap().last().unwrap().1, a.encoded);
    }

    #[tokio::test]
    async fn test_replaced_end_does_not_advance() {
        let f = fixture();
        let a = start_playing(&f, "a").await;
        start_playing(&f, "b").await;

        f.manager
            .handle_node_event(NodeEvent::TrackEnd {
                guild_id: guild(),
                track: a,
                reason: TrackEndReason::Replaced,
            })
            .await;

        let (_, upcoming) = f.manager.queue_view(&guild()).await.unwrap();
        assert_eq!(upcoming.len(), 1, "replaced end must not consume the queue");
        assert_eq!(f.node.played.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_failed_does_not_loop_one() {
        let f = fixture();
        let a = start_playing(&f, "a").await;
        f.manager.toggle_loop(&guild()).await.unwrap();

        f.manager
            .handle_node_event(NodeEvent::TrackEnd {
                guild_id: guild(),
                track: a,
                reason: TrackEndReason::LoadFailed,
            })
            .await;

        let (current, _) = f.manager.queue_view(&guild()).await.unwrap();
        assert!(current.is_none(), "a broken track must not replay forever");
    }

    #[tokio::test]
    async fn test_skip_plays_next_then_stops_when_empty() {
        let f = fixture();
        let a = start_playing(&f, "a").await;
        start_playing(&f, "b").await;

        let skipped = f.manager.skip(&guild()).await.unwrap();
        assert_eq!(skipped.info.title, a.info.title);
        assert_eq!(f.node.played.lock().unwrap().last().unwrap().1, "enc:b");

        let skipped = f.manager.skip(&guild()).await.unwrap();
        assert_eq!(skipped.info.title, "b");
        assert_eq!(f.node.stopped.lock().unwrap().len(), 1);

        assert!(matches!(
            f.manager.skip(&guild()).await,
            Err(PlaybackError::NothingPlaying)
        ));
    }

    #[tokio::test]
    async fn test_track_start_posts_then_edits_status_message() {
        let f = fixture();
        let a = start_playing(&f, "a").await;

        f.manager
            .handle_node_event(NodeEvent::TrackStart {
                guild_id: guild(),
                track: a,
            })
            .await;
        assert_eq!(f.chat.sent.lock().unwrap().len(), 1);
        assert!(f.chat.sent.lock().unwrap()[0].1.contains("**a**"));

        let b = start_playing(&f, "b").await;
        f.manager
            .handle_node_event(NodeEvent::TrackStart {
                guild_id: guild(),
                track: b,
            })
            .await;
        // Second start edits the stored message instead of posting again.
        assert_eq!(f.chat.sent.lock().unwrap().len(), 1);
        assert_eq!(f.chat.edited.lock().unwrap().len(), 1);
        assert!(f.chat.edited.lock().unwrap()[0].2.contains("**b**"));
    }

    #[tokio::test]
    async fn test_idle_sweep_disconnects_empty_channel() {
        let voice = Arc::new(MockVoice::new(false));
        let f = fixture_with(
            voice.clone(),
            PlayerConfig {
                connect_backoff_ms: 5,
                idle_threshold_secs: 0,
                ..PlayerConfig::default()
            },
        );
        start_playing(&f, "a").await;

        // Listeners present: the sweep must leave the session alone.
        f.manager.sweep_idle().await;
        assert!(f.manager.queue_view(&guild()).await.is_ok());

        voice.set_members(vec![]);
        f.manager.sweep_idle().await;
        assert!(matches!(
            f.manager.queue_view(&guild()).await,
            Err(PlaybackError::NotConnected)
        ));
        assert_eq!(f.voice.leaves.lock().unwrap().len(), 1);
    }
}
