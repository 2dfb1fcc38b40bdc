//! The set of issue-tracker events a user can subscribe a channel to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported event type: {0}")]
pub struct UnknownEventType(pub String);

/// Service hook event types, named as the remote service names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "workitem.created")]
    WorkItemCreated,
    #[serde(rename = "workitem.updated")]
    WorkItemUpdated,
    #[serde(rename = "workitem.deleted")]
    WorkItemDeleted,
    #[serde(rename = "workitem.commented")]
    WorkItemCommented,
    #[serde(rename = "git.push")]
    CodePushed,
    #[serde(rename = "git.pullrequest.created")]
    PullRequestCreated,
    #[serde(rename = "git.pullrequest.updated")]
    PullRequestUpdated,
    #[serde(rename = "git.pullrequest.merged")]
    PullRequestMerged,
    #[serde(rename = "build.complete")]
    BuildCompleted,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        Self::WorkItemCreated,
        Self::WorkItemUpdated,
        Self::WorkItemDeleted,
        Self::WorkItemCommented,
        Self::CodePushed,
        Self::PullRequestCreated,
        Self::PullRequestUpdated,
        Self::PullRequestMerged,
        Self::BuildCompleted,
    ];

    /// Wire name used by the remote service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkItemCreated => "workitem.created",
            Self::WorkItemUpdated => "workitem.updated",
            Self::WorkItemDeleted => "workitem.deleted",
            Self::WorkItemCommented => "workitem.commented",
            Self::CodePushed => "git.push",
            Self::PullRequestCreated => "git.pullrequest.created",
            Self::PullRequestUpdated => "git.pullrequest.updated",
            Self::PullRequestMerged => "git.pullrequest.merged",
            Self::BuildCompleted => "build.complete",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}
