//! Contracts over the issue tracker's REST API.
//!
//! The reconciler only ever talks to the remote service through these
//! traits. Implementations perform exactly one HTTP exchange per call and
//! never retry; deciding whether to try again belongs to the caller.

use async_trait::async_trait;
use thiserror::Error;

use tracklink_shared::events::EventType;
use tracklink_store::LinkedProject;

use crate::tasks::{CreatedTask, TaskRequest};

/// Errors from a remote call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The addressed remote resource does not exist.
    #[error("Remote resource not found")]
    NotFound,

    /// The remote service answered with a non-success status.
    #[error("Remote service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// No answer within the configured timeout. The remote state is unknown.
    #[error("Remote call timed out: {0}")]
    Timeout(String),

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Transport(String),

    /// The remote answer could not be understood.
    #[error("Unexpected remote response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Upstream HTTP status, if the remote service produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::NotFound => Some(404),
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else if err.is_connect() {
            GatewayError::Transport(format!("Connection failed: {}", err))
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// A project as the remote service describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
}

/// Subscription CRUD on the remote service.
#[async_trait]
pub trait SubscriptionGateway: Send + Sync {
    /// Confirm that `project` exists in `organization`.
    async fn describe_project(
        &self,
        organization: &str,
        project: &str,
    ) -> Result<RemoteProject, GatewayError>;

    /// Register a service hook for `event_type` on `project`, delivering to
    /// `channel_id`. Returns the remote subscription id.
    async fn create_subscription(
        &self,
        project: &LinkedProject,
        event_type: EventType,
        channel_id: &str,
    ) -> Result<String, GatewayError>;

    /// Remove a service hook. A subscription already gone is a success.
    async fn delete_subscription(
        &self,
        organization: &str,
        project: &str,
        remote_subscription_id: &str,
    ) -> Result<(), GatewayError>;
}

/// Work item creation on the remote service.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn create_task(&self, request: &TaskRequest) -> Result<CreatedTask, GatewayError>;
}
