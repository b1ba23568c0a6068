//! Prefix-command surface: thin translation between chat messages and
//! player operations. Every failure path maps to a distinct reply via the
//! error types' `Display` strings.

use std::sync::Arc;

use crate::{
    common::{errors::PlaybackError, types::GuildId},
    gateway::ChatCommand,
    player::{PlayOutcome, PlayerManager},
};

/// Split a prefixed message into command name and argument string.
fn parse<'a>(prefix: &str, content: &'a str) -> Option<(String, &'a str)> {
    let body = content.strip_prefix(prefix)?.trim();
    if body.is_empty() {
        return None;
    }
    let (name, args) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    Some((name.to_lowercase(), args))
}

/// Execute one chat command and produce the reply text. Returns `None` for
/// messages that are not a known command.
pub async fn dispatch(
    manager: &Arc<PlayerManager>,
    prefix: &str,
    command: ChatCommand,
) -> Option<String> {
    let (name, args) = parse(prefix, &command.content)?;
    let guild_id = &command.guild_id;

    let reply = match name.as_str() {
        "play" | "p" => {
            if args.is_empty() {
                Ok(format!("Usage: {}play <song or link>", prefix))
            } else {
                play(manager, &command, args).await
            }
        }
        "stop" => manager
            .stop(guild_id)
            .await
            .map(|_| "Disconnected.".to_string()),
        "skip" | "s" => manager
            .skip(guild_id)
            .await
            .map(|track| format!("Skipped: **{}**", track.info.title)),
        "queue" | "q" => queue_view(manager, guild_id).await,
        "shuffle" => manager
            .shuffle(guild_id)
            .await
            .map(|n| format!("Shuffled {} track(s).", n)),
        "clear" => manager
            .clear(guild_id)
            .await
            .map(|n| format!("Cleared {} track(s) from the queue.", n)),
        "loop" => manager
            .toggle_loop(guild_id)
            .await
            .map(|mode| format!("Loop mode: **{}**", mode.label())),
        "pause" => manager
            .set_paused(guild_id, true)
            .await
            .map(|_| "Paused.".to_string()),
        "resume" => manager
            .set_paused(guild_id, false)
            .await
            .map(|_| "Resumed.".to_string()),
        "np" | "nowplaying" => now_playing(manager, guild_id).await,
        _ => return None,
    };

    Some(reply.unwrap_or_else(|e| e.to_string()))
}

async fn play(
    manager: &Arc<PlayerManager>,
    command: &ChatCommand,
    query: &str,
) -> Result<String, PlaybackError> {
    let outcome = manager
        .play(
            &command.guild_id,
            command.user_id,
            command.channel_id,
            query,
        )
        .await?;

    Ok(match outcome {
        PlayOutcome::Started(track) => format!("Now playing: **{}**", track.info.title),
        PlayOutcome::Queued { track, position } => {
            format!("Queued: **{}** (position {})", track.info.title, position)
        }
    })
}

async fn queue_view(
    manager: &Arc<PlayerManager>,
    guild_id: &GuildId,
) -> Result<String, PlaybackError> {
    let (current, upcoming) = manager.queue_view(guild_id).await?;

    let mut lines = Vec::new();
    match current {
        Some(track) => lines.push(format!(
            "Now playing: **{}** — {} [{}]",
            track.info.title,
            track.info.author,
            fmt_duration(track.info.length)
        )),
        None => lines.push("Nothing is playing.".to_string()),
    }

    if upcoming.is_empty() {
        lines.push("The queue is empty.".to_string());
    } else {
        for (index, track) in upcoming.iter().take(10).enumerate() {
            lines.push(format!(
                "{}. **{}** [{}]",
                index + 1,
                track.info.title,
                fmt_duration(track.info.length)
            ));
        }
        if upcoming.len() > 10 {
            lines.push(format!("… and {} more", upcoming.len() - 10));
        }
    }

    Ok(lines.join("\n"))
}

async fn now_playing(
    manager: &Arc<PlayerManager>,
    guild_id: &GuildId,
) -> Result<String, PlaybackError> {
    let (current, _) = manager.queue_view(guild_id).await?;
    let track = current.ok_or(PlaybackError::NothingPlaying)?;
    Ok(format!(
        "Now playing: **{}** — {} [{}]",
        track.info.title,
        track.info.author,
        fmt_duration(track.info.length)
    ))
}

/// `m:ss`, or `h:mm:ss` past the hour. Live streams render as `live`.
fn fmt_duration(ms: u64) -> String {
    if ms == 0 {
        return "live".to_string();
    }
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
