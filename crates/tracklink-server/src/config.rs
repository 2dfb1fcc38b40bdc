//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracklink_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_UPSTREAM_TIMEOUT_SECS};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite file holding linked projects and subscriptions.
    /// Env: `DATABASE_PATH`
    /// Default: `./tracklink.db`
    pub database_path: PathBuf,

    /// Externally reachable base URL of this server. Service hook callbacks
    /// are registered against `<public_url>/notification`.
    /// Env: `PUBLIC_URL`
    /// Default: `http://localhost:8080`
    pub public_url: String,

    /// Base URL of the Azure DevOps REST API.
    /// Env: `AZURE_DEVOPS_BASE_URL`
    /// Default: `https://dev.azure.com`
    pub azure_devops_url: String,

    /// Personal access token used for every Azure DevOps call.
    /// Env: `AZURE_DEVOPS_PAT`
    pub azure_devops_token: Option<String>,

    /// Base URL of the Mattermost server.
    /// Env: `MATTERMOST_URL`
    /// Default: `http://localhost:8065`
    pub mattermost_url: String,

    /// Bot access token for posting messages.
    /// Env: `MATTERMOST_BOT_TOKEN`
    pub mattermost_token: Option<String>,

    /// User id of the bot account; posts are authored by it and task
    /// confirmations are sent as direct messages from it.
    /// Env: `MATTERMOST_BOT_USER_ID`
    pub bot_user_id: Option<String>,

    /// Timeout applied to each upstream HTTP call.
    /// Env: `UPSTREAM_TIMEOUT_SECS`
    /// Default: `30`
    pub upstream_timeout: Duration,

    /// How often idle per-user locks are dropped.
    /// Env: `LOCK_PURGE_SECS`
    /// Default: `300`
    pub lock_purge_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./tracklink.db"),
            public_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            azure_devops_url: "https://dev.azure.com".to_string(),
            azure_devops_token: None,
            mattermost_url: "http://localhost:8065".to_string(),
            mattermost_token: None,
            bot_user_id: None,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            lock_purge_interval: Duration::from_secs(300),
        }
    }
}

// Tokens are never printed.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("public_url", &self.public_url)
            .field("azure_devops_url", &self.azure_devops_url)
            .field("azure_devops_token", &self.azure_devops_token.as_ref().map(|_| "***"))
            .field("mattermost_url", &self.mattermost_url)
            .field("mattermost_token", &self.mattermost_token.as_ref().map(|_| "***"))
            .field("bot_user_id", &self.bot_user_id)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("lock_purge_interval", &self.lock_purge_interval)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(url) = lookup("PUBLIC_URL") {
            config.public_url = trim_url(&url);
        }

        if let Some(url) = lookup("AZURE_DEVOPS_BASE_URL") {
            config.azure_devops_url = trim_url(&url);
        }

        config.azure_devops_token = non_empty(lookup("AZURE_DEVOPS_PAT"));

        if let Some(url) = lookup("MATTERMOST_URL") {
            config.mattermost_url = trim_url(&url);
        }

        config.mattermost_token = non_empty(lookup("MATTERMOST_BOT_TOKEN"));
        config.bot_user_id = non_empty(lookup("MATTERMOST_BOT_USER_ID"));

        if let Some(val) = lookup("UPSTREAM_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.upstream_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid UPSTREAM_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(val) = lookup("LOCK_PURGE_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.lock_purge_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid LOCK_PURGE_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
