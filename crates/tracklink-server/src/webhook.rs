//! Turns service hook callbacks into channel posts.

use std::sync::Arc;

use tracing::{debug, error};

use tracklink_shared::notification::WebhookEvent;

use crate::chat::{ChatPlatform, Post};
use crate::error::ServerError;

/// What happened to a well-formed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Posted,
    /// The chat platform refused the post. The sender is still acknowledged.
    PostFailed,
}

pub struct WebhookIngestor {
    chat: Arc<dyn ChatPlatform>,
    bot_user_id: Option<String>,
}

impl WebhookIngestor {
    pub fn new(chat: Arc<dyn ChatPlatform>, bot_user_id: Option<String>) -> Self {
        Self { chat, bot_user_id }
    }

    pub async fn ingest(
        &self,
        channel_id: Option<&str>,
        body: &[u8],
    ) -> Result<Delivery, ServerError> {
        let channel_id = channel_id
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServerError::BadRequest("channelID is required".to_string()))?;

        let event = WebhookEvent::parse(body)
            .map_err(|e| ServerError::BadRequest(format!("Invalid webhook payload: {e}")))?;

        let post = Post::new(channel_id, event.summary()).authored_by(self.bot_user_id.clone());
        match self.chat.create_post(&post).await {
            Ok(()) => {
                debug!(channel = %channel_id, event = ?event.event_type, "Delivered notification");
                Ok(Delivery::Posted)
            }
            Err(err) => {
                error!(channel = %channel_id, error = %err, "Failed to post notification");
                Ok(Delivery::PostFailed)
            }
        }
    }
}
