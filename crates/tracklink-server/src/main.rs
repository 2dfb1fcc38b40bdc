//! # tracklink-server
//!
//! Bridges an Azure DevOps organization and a Mattermost workspace.
//!
//! This binary provides:
//! - **Project linking** so a chat user can record the projects they follow
//! - **Subscriptions** that register a service hook remotely and remember it
//!   locally, kept in agreement by the reconciler
//! - **Webhook ingestion** that turns service hook callbacks into channel posts
//! - **Task creation** with a direct-message confirmation
//! - **REST API** (axum) for all of the above

mod api;
mod auth;
mod azure;
mod chat;
mod config;
mod error;
mod gateway;
mod locks;
mod mattermost;
mod reconcile;
mod tasks;
mod webhook;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tracklink_shared::constants::APP_NAME;
use tracklink_store::Database;

use crate::api::AppState;
use crate::azure::AzureDevOpsClient;
use crate::config::ServerConfig;
use crate::locks::UserLocks;
use crate::mattermost::MattermostClient;
use crate::reconcile::Reconciler;
use crate::webhook::WebhookIngestor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tracklink_server=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.azure_devops_token.is_none() {
        warn!("AZURE_DEVOPS_PAT is not set; remote calls will be unauthenticated");
    }
    if config.bot_user_id.is_none() {
        warn!("MATTERMOST_BOT_USER_ID is not set; task confirmations are disabled");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let database = Arc::new(Database::open_at(&config.database_path)?);
    info!(path = %config.database_path.display(), "Opened database");

    let azure = Arc::new(AzureDevOpsClient::new(&config)?);
    let chat = Arc::new(MattermostClient::new(&config)?);
    let locks = UserLocks::new();

    let reconciler = Arc::new(Reconciler::new(
        database.clone(),
        database,
        azure.clone(),
        locks.clone(),
    ));
    let webhooks = Arc::new(WebhookIngestor::new(chat.clone(), config.bot_user_id.clone()));

    let app_state = AppState {
        reconciler,
        webhooks,
        chat,
        tasks: azure,
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic cleanup of per-user locks nobody holds
    let purge_every = config.lock_purge_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            locks.purge_idle().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
