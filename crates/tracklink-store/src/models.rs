//! Domain records persisted per user.
//!
//! Field names on the wire are fixed (`ownerUserID`, `projectID`, ...) so the
//! stored documents stay readable by other consumers of the same store.

use serde::{Deserialize, Serialize};
use tracklink_shared::events::EventType;

// ---------------------------------------------------------------------------
// LinkedProject
// ---------------------------------------------------------------------------

/// An organization/project pair a user has linked.
///
/// Identity is `(organization_name, project_name)`, compared exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedProject {
    #[serde(rename = "ownerUserID")]
    pub owner_user_id: String,
    #[serde(rename = "organizationName")]
    pub organization_name: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    /// Remote-assigned project id, attached once the link succeeded.
    #[serde(rename = "projectID", default)]
    pub project_id: String,
}

impl LinkedProject {
    pub fn new(
        owner_user_id: impl Into<String>,
        organization_name: impl Into<String>,
        project_name: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            organization_name: organization_name.into(),
            project_name: project_name.into(),
            project_id: project_id.into(),
        }
    }

    /// `true` if both records name the same organization/project.
    pub fn same_project(&self, other: &LinkedProject) -> bool {
        self.is(&other.organization_name, &other.project_name)
    }

    pub fn is(&self, organization_name: &str, project_name: &str) -> bool {
        self.organization_name == organization_name && self.project_name == project_name
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A registered interest in one event type of one linked project, delivered
/// to one channel.
///
/// Identity is `(organization_name, project_name, event_type, channel_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    #[serde(rename = "ownerUserID")]
    pub owner_user_id: String,
    #[serde(rename = "organizationName")]
    pub organization_name: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "eventType")]
    pub event_type: EventType,
    #[serde(rename = "channelID")]
    pub channel_id: String,
    /// The remote service's handle; never empty once persisted.
    #[serde(rename = "remoteSubscriptionID", default)]
    pub remote_subscription_id: String,
}

impl Subscription {
    /// A subscription not yet registered remotely.
    pub fn pending(
        owner_user_id: impl Into<String>,
        organization_name: impl Into<String>,
        project_name: impl Into<String>,
        event_type: EventType,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            organization_name: organization_name.into(),
            project_name: project_name.into(),
            event_type,
            channel_id: channel_id.into(),
            remote_subscription_id: String::new(),
        }
    }

    /// `true` if both records share the identity key.
    pub fn same_subscription(&self, other: &Subscription) -> bool {
        self.belongs_to(&other.organization_name, &other.project_name)
            && self.event_type == other.event_type
            && self.channel_id == other.channel_id
    }

    /// `true` if this subscription watches the given project.
    pub fn belongs_to(&self, organization_name: &str, project_name: &str) -> bool {
        self.organization_name == organization_name && self.project_name == project_name
    }

    pub fn is_registered(&self) -> bool {
        !self.remote_subscription_id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_identity_is_case_sensitive() {
        let a = LinkedProject::new("u1", "org", "Proj", "id-1");
        let b = LinkedProject::new("u1", "org", "proj", "id-1");
        let c = LinkedProject::new("u1", "org", "Proj", "other-id");
        assert!(!a.same_project(&b));
        assert!(a.same_project(&c));
    }

    #[test]
    fn test_subscription_identity_ignores_remote_id() {
        let mut a = Subscription::pending("u1", "org", "proj", EventType::CodePushed, "C1");
        let b = a.clone();
        a.remote_subscription_id = "remote-1".into();
        assert!(a.same_subscription(&b));
        assert!(a.is_registered());
        assert!(!b.is_registered());

        let other_channel =
            Subscription::pending("u1", "org", "proj", EventType::CodePushed, "C2");
        assert!(!a.same_subscription(&other_channel));
    }

    #[test]
    fn test_wire_field_names() {
        let sub = Subscription {
            remote_subscription_id: "r1".into(),
            ..Subscription::pending("u1", "org", "proj", EventType::BuildCompleted, "C1")
        };
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["ownerUserID"], "u1");
        assert_eq!(json["eventType"], "build.complete");
        assert_eq!(json["channelID"], "C1");
        assert_eq!(json["remoteSubscriptionID"], "r1");
    }
}
