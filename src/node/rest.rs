use async_trait::async_trait;
use serde_json::json;

use crate::{
    common::{errors::NodeError, types::GuildId},
    configs::NodeConfig,
    node::{AudioApi, SessionSlot},
    protocol::{LoadResult, VoiceUpdate},
};

/// REST client for the node's `/v4` API.
pub struct NodeRest {
    client: reqwest::Client,
    base: String,
    password: String,
    session: SessionSlot,
}

impl NodeRest {
    pub fn new(client: reqwest::Client, config: &NodeConfig, session: SessionSlot) -> Self {
        Self {
            client,
            base: config.rest_base(),
            password: config.password.clone(),
            session,
        }
    }

    fn player_url(&self, guild_id: &GuildId) -> Result<String, NodeError> {
        let session_id = self.session.get().ok_or(NodeError::NoSession)?;
        Ok(format!(
            "{}/v4/sessions/{}/players/{}",
            self.base, session_id, guild_id
        ))
    }

    async fn update_player(
        &self,
        guild_id: &GuildId,
        body: serde_json::Value,
    ) -> Result<(), NodeError> {
        let url = self.player_url(guild_id)?;
        let response = self
            .client
            .patch(&url)
            .header("Authorization", &self.password)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NodeError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioApi for NodeRest {
    async fn load_tracks(&self, identifier: &str) -> Result<LoadResult, NodeError> {
        let url = format!(
            "{}/v4/loadtracks?identifier={}",
            self.base,
            urlencoding::encode(identifier)
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.password)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NodeError::Status(response.status().as_u16()));
        }
        Ok(response.json::<LoadResult>().await?)
    }

    async fn play(&self, guild_id: &GuildId, encoded: &str) -> Result<(), NodeError> {
        self.update_player(
            guild_id,
            json!({"track": {"encoded": encoded}, "paused": false}),
        )
        .await
    }

    async fn stop(&self, guild_id: &GuildId) -> Result<(), NodeError> {
        self.update_player(guild_id, json!({"track": {"encoded": null}}))
            .await
    }

    async fn set_paused(&self, guild_id: &GuildId, paused: bool) -> Result<(), NodeError> {
        self.update_player(guild_id, json!({"paused": paused})).await
    }

    async fn submit_voice(&self, guild_id: &GuildId, voice: &VoiceUpdate) -> Result<(), NodeError> {
        self.update_player(guild_id, json!({"voice": voice})).await
    }

    async fn destroy(&self, guild_id: &GuildId) -> Result<(), NodeError> {
        let url = self.player_url(guild_id)?;
        let response = self
            .client
            .delete(&url)
            .header("Authorization", &self.password)
            .send()
            .await?;

        // 404 just means the node never saw this player; nothing to tear down.
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(NodeError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
