use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{
    common::{
        errors::ChatError,
        types::{ChannelId, MessageId},
    },
    configs::DiscordConfig,
};

const API_BASE: &str = "https://discord.com/api/v10";

/// The slice of Discord's REST API the bot replies through.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, channel: ChannelId, content: &str)
    -> Result<MessageId, ChatError>;

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), ChatError>;
}

pub struct DiscordRest {
    client: reqwest::Client,
    token: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    id: String,
}

impl DiscordRest {
    pub fn new(client: reqwest::Client, config: &DiscordConfig) -> Self {
        Self {
            client,
            token: config.token.clone(),
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }
}

#[async_trait]
impl ChatApi for DiscordRest {
    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, ChatError> {
        let url = format!("{}/channels/{}/messages", API_BASE, channel);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .json(&json!({"content": content}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status().as_u16()));
        }

        let message: MessageResponse = response.json().await?;
        let id = message
            .id
            .parse::<u64>()
            .map_err(|_| ChatError::Status(0))?;
        Ok(MessageId(id))
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), ChatError> {
        let url = format!("{}/channels/{}/messages/{}", API_BASE, channel, message);
        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth())
            .json(&json!({"content": content}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
