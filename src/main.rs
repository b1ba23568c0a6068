use std::sync::Arc;

use tracing::{info, warn};

use groovelink::commands;
use groovelink::common::logger;
use groovelink::configs::{Config, LastFmConfig};
use groovelink::gateway::{
    Gateway, GatewayHandle,
    rest::{ChatApi, DiscordRest},
};
use groovelink::node::{NodeRest, NodeSocket, SessionSlot};
use groovelink::player::{PlayerManager, monitor};
use groovelink::resolver::TrackResolver;
use groovelink::scrobble::{AccountStore, LastFmClient, ScrobbleScheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load()?;
    logger::init(&config);

    if config.discord.token.is_empty() {
        return Err("discord.token is not configured".into());
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("groovelink/", env!("CARGO_PKG_VERSION")))
        .build()?;

    // -- Discord gateway ----------------------------------------------------
    let handle = GatewayHandle::new();
    let (command_tx, mut command_rx) = tokio::sync::mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    let gateway = Gateway::new(config.discord.clone(), handle.clone(), command_tx, ready_tx);
    tokio::spawn(gateway.run());

    info!("Waiting for gateway session...");
    let bot_user_id = ready_rx.await.map_err(|_| "gateway closed before READY")?;

    // -- Audio node ---------------------------------------------------------
    let session = SessionSlot::new();
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let socket = NodeSocket::new(config.node.clone(), bot_user_id, session.clone(), event_tx);
    tokio::spawn(socket.run());

    let node = Arc::new(NodeRest::new(http.clone(), &config.node, session));
    let chat = Arc::new(DiscordRest::new(http.clone(), &config.discord));
    let resolver = Arc::new(TrackResolver::new(node.clone(), http.clone()));

    // -- Last.fm ------------------------------------------------------------
    let lastfm_config = match &config.lastfm {
        Some(lastfm) if !lastfm.api_key.is_empty() => lastfm.clone(),
        _ => {
            warn!("Last.fm credentials not configured; scrobbling disabled");
            LastFmConfig {
                api_key: String::new(),
                api_secret: String::new(),
                accounts_path: String::new(),
            }
        }
    };
    let accounts = if lastfm_config.accounts_path.is_empty() {
        Arc::new(AccountStore::default())
    } else {
        Arc::new(AccountStore::load(&lastfm_config.accounts_path)?)
    };
    let profile = Arc::new(LastFmClient::new(http.clone(), &lastfm_config));

    // -- Playback orchestration --------------------------------------------
    let scrobbler = Arc::new(ScrobbleScheduler::new(accounts, profile, handle.clone()));
    let manager = Arc::new(PlayerManager::new(
        node,
        handle.clone(),
        chat.clone(),
        resolver,
        scrobbler,
        config.player.clone(),
    ));

    tokio::spawn(monitor::run(manager.clone()));

    info!("groovelink is up (prefix '{}')", config.discord.prefix);

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                manager.handle_node_event(event).await;
            }
            Some(command) = command_rx.recv() => {
                let channel = command.channel_id;
                if let Some(reply) =
                    commands::dispatch(&manager, &config.discord.prefix, command).await
                {
                    if let Err(e) = chat.send_message(channel, &reply).await {
                        warn!("Reply failed: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
