use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use tracklink_store::{StoreError, Subscription};

use crate::chat::ChatError;
use crate::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Project {organization}/{project} is already linked")]
    AlreadyLinked { organization: String, project: String },

    #[error("Project {organization}/{project} is not linked")]
    NotLinked { organization: String, project: String },

    #[error("Project {organization}/{project} was not found")]
    ProjectNotFound { organization: String, project: String },

    #[error("A subscription for this event and channel already exists")]
    AlreadySubscribed,

    #[error("Subscription not found")]
    NotSubscribed,

    #[error("Upstream error: {message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error(
        "Unlink stopped: removed {} subscription(s), {} remain: {cause}",
        .removed.len(),
        .remaining.len()
    )]
    PartialCascadeFailure {
        removed: Vec<Subscription>,
        remaining: Vec<Subscription>,
        cause: String,
    },

    #[error(
        "Remote subscription {remote_subscription_id} on {organization}/{project} is registered \
         but could not be recorded or removed: {cause}"
    )]
    OrphanedRemoteSubscription {
        remote_subscription_id: String,
        organization: String,
        project: String,
        cause: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for ServerError {
    fn from(err: GatewayError) -> Self {
        ServerError::Upstream {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl From<ChatError> for ServerError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::NotFound => Some(404),
            ChatError::Api { status, .. } => Some(*status),
            ChatError::Network(_) | ChatError::Decode(_) => None,
        };
        ServerError::Upstream {
            status,
            message: err.to_string(),
        }
    }
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_)
            | ServerError::AlreadyLinked { .. }
            | ServerError::NotLinked { .. }
            | ServerError::ProjectNotFound { .. }
            | ServerError::AlreadySubscribed
            | ServerError::NotSubscribed => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            // A 4xx from upstream means the caller's input was rejected.
            ServerError::Upstream {
                status: Some(status),
                ..
            } if (400..500).contains(status) => StatusCode::BAD_REQUEST,
            ServerError::Upstream { .. }
            | ServerError::Storage(_)
            | ServerError::PartialCascadeFailure { .. }
            | ServerError::OrphanedRemoteSubscription { .. }
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            ServerError::Storage(_) => serde_json::json!({ "error": "Storage error" }),
            ServerError::Internal(_) => serde_json::json!({ "error": "Internal server error" }),
            ServerError::Upstream { status, .. } => serde_json::json!({
                "error": self.to_string(),
                "status": status,
            }),
            ServerError::PartialCascadeFailure {
                removed, remaining, ..
            } => serde_json::json!({
                "error": self.to_string(),
                "removed": removed,
                "remaining": remaining,
            }),
            ServerError::OrphanedRemoteSubscription {
                remote_subscription_id,
                organization,
                project,
                ..
            } => serde_json::json!({
                "error": self.to_string(),
                "remoteSubscriptionID": remote_subscription_id,
                "organization": organization,
                "project": project,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, axum::Json(body)).into_response()
    }
}
