use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tracklink_shared::constants::{CHANNEL_TYPE_OPEN, NOTIFICATION_PATH};
use tracklink_shared::events::EventType;
use tracklink_store::{LinkedProject, Subscription};

use crate::auth::{is_valid_chat_id, require_user, CallerId};
use crate::chat::{Channel, ChatError, ChatPlatform, Post};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::gateway::TaskGateway;
use crate::reconcile::Reconciler;
use crate::tasks::{confirmation_message, CreatedTask, TaskRequest};
use crate::webhook::WebhookIngestor;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    pub webhooks: Arc<WebhookIngestor>,
    pub chat: Arc<dyn ChatPlatform>,
    pub tasks: Arc<dyn TaskGateway>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/link", post(link_project))
        .route("/project/link", get(linked_projects))
        .route("/project/unlink", post(unlink_project))
        .route(
            "/subscriptions",
            post(create_subscription)
                .get(list_subscriptions)
                .delete(delete_subscription),
        )
        .route("/tasks", post(create_task))
        .route("/channels/{team_id}", get(team_channels))
        .route_layer(middleware::from_fn(require_user));

    Router::new()
        .route("/health", get(health_check))
        .route(NOTIFICATION_PATH, post(notification))
        .merge(protected)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Decode a JSON body regardless of the declared content type, so every
/// malformed or incomplete body is a `400`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ServerError> {
    if body.is_empty() {
        return Err(ServerError::BadRequest("Request body is required".to_string()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("Malformed request body: {e}")))
}

fn require<'a>(name: &str, value: &'a str) -> Result<&'a str, ServerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServerError::BadRequest(format!("{name} is required")));
    }
    Ok(value)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct LinkRequest {
    #[serde(default)]
    organization: String,
    #[serde(default)]
    project: String,
}

#[derive(Deserialize)]
struct UnlinkRequest {
    #[serde(rename = "organizationName", default)]
    organization_name: String,
    #[serde(rename = "projectName", default)]
    project_name: String,
    /// Accepted for compatibility; identity is the organization/project pair.
    #[serde(rename = "projectID", default)]
    #[allow(dead_code)]
    project_id: String,
}

#[derive(Deserialize)]
struct SubscriptionRequest {
    #[serde(default)]
    organization: String,
    #[serde(default)]
    project: String,
    #[serde(rename = "eventType", default)]
    event_type: String,
    #[serde(rename = "channelID", default)]
    channel_id: String,
}

/// A subscription request with every field checked.
struct SubscriptionTarget<'a> {
    organization: &'a str,
    project: &'a str,
    event_type: EventType,
    channel_id: &'a str,
}

impl SubscriptionRequest {
    fn validate(&self) -> Result<SubscriptionTarget<'_>, ServerError> {
        let event_type = require("eventType", &self.event_type)?
            .parse::<EventType>()
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        Ok(SubscriptionTarget {
            organization: require("organization", &self.organization)?,
            project: require("project", &self.project)?,
            event_type,
            channel_id: require("channelID", &self.channel_id)?,
        })
    }
}

#[derive(Deserialize)]
struct SubscriptionsQuery {
    project: Option<String>,
}

#[derive(Deserialize)]
struct NotificationQuery {
    #[serde(rename = "channelID")]
    channel_id: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn link_project(
    State(state): State<AppState>,
    Extension(CallerId(user)): Extension<CallerId>,
    body: Bytes,
) -> Result<Json<LinkedProject>, ServerError> {
    let req: LinkRequest = parse_body(&body)?;
    let organization = require("organization", &req.organization)?;
    let project = require("project", &req.project)?;

    let linked = state.reconciler.link(&user, organization, project).await?;
    Ok(Json(linked))
}

async fn linked_projects(
    State(state): State<AppState>,
    Extension(CallerId(user)): Extension<CallerId>,
) -> Result<Json<Vec<LinkedProject>>, ServerError> {
    Ok(Json(state.reconciler.linked_projects(&user)?))
}

async fn unlink_project(
    State(state): State<AppState>,
    Extension(CallerId(user)): Extension<CallerId>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServerError> {
    let req: UnlinkRequest = parse_body(&body)?;
    let organization = require("organizationName", &req.organization_name)?;
    let project = require("projectName", &req.project_name)?;

    state.reconciler.unlink(&user, organization, project).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn create_subscription(
    State(state): State<AppState>,
    Extension(CallerId(user)): Extension<CallerId>,
    body: Bytes,
) -> Result<Json<Subscription>, ServerError> {
    let req: SubscriptionRequest = parse_body(&body)?;
    let target = req.validate()?;

    match state.chat.get_channel(target.channel_id).await {
        Ok(_) => {}
        Err(ChatError::NotFound) => {
            return Err(ServerError::BadRequest(format!(
                "Channel {} does not exist",
                target.channel_id
            )))
        }
        Err(err) => return Err(err.into()),
    }

    let subscription = state
        .reconciler
        .subscribe(
            &user,
            target.organization,
            target.project,
            target.event_type,
            target.channel_id,
        )
        .await?;
    Ok(Json(subscription))
}

async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(CallerId(user)): Extension<CallerId>,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<Vec<Subscription>>, ServerError> {
    let project = query
        .project
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    Ok(Json(state.reconciler.subscriptions(&user, project)?))
}

async fn delete_subscription(
    State(state): State<AppState>,
    Extension(CallerId(user)): Extension<CallerId>,
    body: Bytes,
) -> Result<StatusCode, ServerError> {
    let req: SubscriptionRequest = parse_body(&body)?;
    let target = req.validate()?;

    state
        .reconciler
        .unsubscribe(
            &user,
            target.organization,
            target.project,
            target.event_type,
            target.channel_id,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn notification(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    body: Bytes,
) -> Result<StatusCode, ServerError> {
    state
        .webhooks
        .ingest(query.channel_id.as_deref(), &body)
        .await?;
    Ok(StatusCode::OK)
}

async fn create_task(
    State(state): State<AppState>,
    Extension(CallerId(user)): Extension<CallerId>,
    body: Bytes,
) -> Result<Json<CreatedTask>, ServerError> {
    let req: TaskRequest = parse_body(&body)?;
    req.validate()?;

    let task = state.tasks.create_task(&req).await?;
    info!(user = %user, id = task.id, "Created task");

    if let Some(bot) = state.config.bot_user_id.as_deref() {
        if let Err(err) = send_confirmation(state.chat.as_ref(), bot, &user, &req, &task).await {
            warn!(user = %user, error = %err, "Failed to send task confirmation");
        }
    }

    Ok(Json(task))
}

async fn send_confirmation(
    chat: &dyn ChatPlatform,
    bot: &str,
    user: &str,
    req: &TaskRequest,
    task: &CreatedTask,
) -> Result<(), ChatError> {
    let channel = chat.get_direct_channel(bot, user).await?;
    let post = Post::new(channel.id, confirmation_message(req, task)).authored_by(Some(bot.into()));
    chat.create_post(&post).await
}

async fn team_channels(
    State(state): State<AppState>,
    Extension(CallerId(user)): Extension<CallerId>,
    Path(team_id): Path<String>,
) -> Result<Json<Vec<Channel>>, ServerError> {
    if !is_valid_chat_id(&team_id) {
        return Err(ServerError::BadRequest(format!("Invalid team id: {team_id}")));
    }

    let channels = state
        .chat
        .get_channels_for_team_for_user(&team_id, &user)
        .await
        .map_err(|e| ServerError::Internal(format!("Failed to list channels: {e}")))?;

    Ok(Json(
        channels
            .into_iter()
            .filter(|c| c.channel_type == CHANNEL_TYPE_OPEN)
            .collect(),
    ))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
