//! [`ChatPlatform`] over the Mattermost REST API (v4).

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::chat::{Channel, ChatError, ChatPlatform, Post};
use crate::config::ServerConfig;

pub struct MattermostClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl MattermostClient {
    pub fn new(config: &ServerConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| ChatError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.mattermost_url.trim_end_matches('/').to_string(),
            token: config.mattermost_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/api/v4{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, ChatError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ChatError::NotFound);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ChatError> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatPlatform for MattermostClient {
    async fn create_post(&self, post: &Post) -> Result<(), ChatError> {
        let response = self.request(Method::POST, "/posts").json(post).send().await?;
        Self::check(response).await?;
        debug!(channel = %post.channel_id, "Created post");
        Ok(())
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, ChatError> {
        let path = format!("/channels/{}", urlencoding::encode(channel_id));
        self.fetch(self.request(Method::GET, &path)).await
    }

    async fn get_direct_channel(&self, user_a: &str, user_b: &str) -> Result<Channel, ChatError> {
        let request = self
            .request(Method::POST, "/channels/direct")
            .json(&[user_a, user_b]);
        self.fetch(request).await
    }

    async fn get_channels_for_team_for_user(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Vec<Channel>, ChatError> {
        let path = format!(
            "/users/{}/teams/{}/channels",
            urlencoding::encode(user_id),
            urlencoding::encode(team_id)
        );
        self.fetch(self.request(Method::GET, &path)).await
    }
}
