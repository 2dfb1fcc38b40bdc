//! Chat platform contract: the few host capabilities this server needs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat resource not found")]
    NotFound,

    #[error("Chat API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Chat network error: {0}")]
    Network(String),

    #[error("Invalid chat API response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Decode(err.to_string())
        } else {
            ChatError::Network(err.to_string())
        }
    }
}

/// A message to create in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub channel_id: String,
    pub message: String,
    /// Author; the platform uses the token's owner when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Post {
    pub fn new(channel_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message: message.into(),
            user_id: None,
        }
    }

    pub fn authored_by(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// `O` public, `P` private, `D` direct, `G` group.
    #[serde(rename = "type", default)]
    pub channel_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub team_id: String,
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn create_post(&self, post: &Post) -> Result<(), ChatError>;

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, ChatError>;

    /// The direct-message channel between two users, created on demand.
    async fn get_direct_channel(&self, user_a: &str, user_b: &str) -> Result<Channel, ChatError>;

    /// Channels of `team_id` that `user_id` is a member of.
    async fn get_channels_for_team_for_user(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Vec<Channel>, ChatError>;
}
