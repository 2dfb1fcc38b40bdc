//! Keeps the local records and the remote service hooks in agreement.
//!
//! Every mutating operation runs under the owner's [`UserLocks`] entry, from
//! the first read of the local set to the last write. Remote calls happen
//! before local writes, so a local record always names a live remote hook
//! unless a step failed and was reported as such.

use std::sync::Arc;

use tracing::{error, info, warn};

use tracklink_shared::events::EventType;
use tracklink_store::{LinkedProject, ProjectStore, StoreError, Subscription, SubscriptionStore};

use crate::error::ServerError;
use crate::gateway::{GatewayError, SubscriptionGateway};
use crate::locks::UserLocks;

/// The stored entry matching `candidate`'s organization/project, if any.
pub fn is_project_linked<'a>(
    projects: &'a [LinkedProject],
    candidate: &LinkedProject,
) -> Option<&'a LinkedProject> {
    projects.iter().find(|p| p.same_project(candidate))
}

/// The stored entry sharing `candidate`'s identity key, if any.
pub fn is_subscription_present<'a>(
    subscriptions: &'a [Subscription],
    candidate: &Subscription,
) -> Option<&'a Subscription> {
    subscriptions.iter().find(|s| s.same_subscription(candidate))
}

pub struct Reconciler {
    projects: Arc<dyn ProjectStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn SubscriptionGateway>,
    locks: UserLocks,
}

impl Reconciler {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        gateway: Arc<dyn SubscriptionGateway>,
        locks: UserLocks,
    ) -> Self {
        Self {
            projects,
            subscriptions,
            gateway,
            locks,
        }
    }

    pub fn linked_projects(&self, user_id: &str) -> Result<Vec<LinkedProject>, ServerError> {
        Ok(self.projects.get_all_projects(user_id)?)
    }

    /// The user's subscriptions, optionally narrowed to one project name.
    pub fn subscriptions(
        &self,
        user_id: &str,
        project_name: Option<&str>,
    ) -> Result<Vec<Subscription>, ServerError> {
        let subscriptions = match project_name {
            Some(project) => self
                .subscriptions
                .get_subscriptions_for_project(user_id, project)?,
            None => self.subscriptions.get_all_subscriptions(user_id)?,
        };
        Ok(subscriptions)
    }

    pub async fn link(
        &self,
        user_id: &str,
        organization: &str,
        project: &str,
    ) -> Result<LinkedProject, ServerError> {
        let remote = match self.gateway.describe_project(organization, project).await {
            Ok(remote) => remote,
            Err(GatewayError::NotFound) => {
                return Err(ServerError::ProjectNotFound {
                    organization: organization.to_string(),
                    project: project.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let _guard = self.locks.lock(user_id).await;

        let candidate = LinkedProject::new(user_id, organization, project, remote.id);
        let linked = self.projects.get_all_projects(user_id)?;
        if is_project_linked(&linked, &candidate).is_some() {
            return Err(ServerError::AlreadyLinked {
                organization: organization.to_string(),
                project: project.to_string(),
            });
        }

        self.projects.store_project(&candidate)?;
        info!(user = %user_id, %organization, %project, "Linked project");
        Ok(candidate)
    }

    /// Remove a linked project together with all of its subscriptions.
    ///
    /// Every subscription is attempted. When any of them cannot be removed
    /// the project stays linked and the error lists what was and was not
    /// removed; running the unlink again picks up where it stopped.
    pub async fn unlink(
        &self,
        user_id: &str,
        organization: &str,
        project: &str,
    ) -> Result<(), ServerError> {
        let _guard = self.locks.lock(user_id).await;

        let target = self.find_linked(user_id, organization, project)?;

        let attached: Vec<Subscription> = self
            .subscriptions
            .get_all_subscriptions(user_id)?
            .into_iter()
            .filter(|s| s.belongs_to(organization, project))
            .collect();

        let mut removed = Vec::new();
        let mut remaining = Vec::new();
        let mut first_failure: Option<String> = None;

        for subscription in attached {
            let outcome = match self.remove_remote(&subscription).await {
                Ok(()) => self
                    .subscriptions
                    .delete_subscription(&subscription)
                    .map_err(|e| e.to_string()),
                Err(err) => Err(err.to_string()),
            };
            match outcome {
                Ok(()) => removed.push(subscription),
                Err(cause) => {
                    warn!(
                        user = %user_id,
                        %organization,
                        %project,
                        remote_id = %subscription.remote_subscription_id,
                        error = %cause,
                        "Could not remove subscription during unlink"
                    );
                    first_failure.get_or_insert(cause);
                    remaining.push(subscription);
                }
            }
        }

        if let Some(cause) = first_failure {
            return Err(ServerError::PartialCascadeFailure {
                removed,
                remaining,
                cause,
            });
        }

        self.projects.delete_project(&target)?;
        info!(
            user = %user_id,
            %organization,
            %project,
            subscriptions = removed.len(),
            "Unlinked project"
        );
        Ok(())
    }

    pub async fn subscribe(
        &self,
        user_id: &str,
        organization: &str,
        project: &str,
        event_type: EventType,
        channel_id: &str,
    ) -> Result<Subscription, ServerError> {
        let _guard = self.locks.lock(user_id).await;

        let target = self.find_linked(user_id, organization, project)?;

        let candidate =
            Subscription::pending(user_id, organization, project, event_type, channel_id);
        let existing = self.subscriptions.get_all_subscriptions(user_id)?;
        if is_subscription_present(&existing, &candidate).is_some() {
            return Err(ServerError::AlreadySubscribed);
        }

        let created = self
            .gateway
            .create_subscription(&target, event_type, channel_id)
            .await;
        let remote_id = match created {
            Ok(id) if !id.trim().is_empty() => id,
            Ok(_) => {
                error!(
                    user = %user_id,
                    %organization,
                    %project,
                    event = %event_type,
                    channel = %channel_id,
                    "Remote hook may exist but no subscription id was returned"
                );
                return Err(ServerError::Upstream {
                    status: None,
                    message: "Remote service returned an empty subscription id".to_string(),
                });
            }
            Err(err @ (GatewayError::Timeout(_) | GatewayError::Decode(_))) => {
                error!(
                    user = %user_id,
                    %organization,
                    %project,
                    event = %event_type,
                    channel = %channel_id,
                    error = %err,
                    "Remote hook state unknown after create"
                );
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let subscription = Subscription {
            remote_subscription_id: remote_id,
            ..candidate
        };
        if let Err(store_err) = self.subscriptions.store_subscription(&subscription) {
            return Err(self.compensate(&subscription, store_err).await);
        }

        info!(
            user = %user_id,
            %organization,
            %project,
            event = %event_type,
            channel = %channel_id,
            remote_id = %subscription.remote_subscription_id,
            "Created subscription"
        );
        Ok(subscription)
    }

    pub async fn unsubscribe(
        &self,
        user_id: &str,
        organization: &str,
        project: &str,
        event_type: EventType,
        channel_id: &str,
    ) -> Result<(), ServerError> {
        let _guard = self.locks.lock(user_id).await;

        let candidate =
            Subscription::pending(user_id, organization, project, event_type, channel_id);
        let existing = self.subscriptions.get_all_subscriptions(user_id)?;
        let stored = is_subscription_present(&existing, &candidate)
            .cloned()
            .ok_or(ServerError::NotSubscribed)?;

        self.remove_remote(&stored).await?;
        self.subscriptions.delete_subscription(&stored)?;

        info!(
            user = %user_id,
            %organization,
            %project,
            event = %event_type,
            channel = %channel_id,
            "Deleted subscription"
        );
        Ok(())
    }

    fn find_linked(
        &self,
        user_id: &str,
        organization: &str,
        project: &str,
    ) -> Result<LinkedProject, ServerError> {
        let linked = self.projects.get_all_projects(user_id)?;
        let candidate = LinkedProject::new(user_id, organization, project, "");
        is_project_linked(&linked, &candidate)
            .cloned()
            .ok_or_else(|| ServerError::NotLinked {
                organization: organization.to_string(),
                project: project.to_string(),
            })
    }

    /// Delete the remote hook behind `subscription`. A hook that is already
    /// gone counts as removed.
    async fn remove_remote(&self, subscription: &Subscription) -> Result<(), GatewayError> {
        if !subscription.is_registered() {
            return Ok(());
        }
        match self
            .gateway
            .delete_subscription(
                &subscription.organization_name,
                &subscription.project_name,
                &subscription.remote_subscription_id,
            )
            .await
        {
            Ok(()) | Err(GatewayError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Undo a remote registration that could not be recorded locally.
    async fn compensate(&self, subscription: &Subscription, store_err: StoreError) -> ServerError {
        match self.remove_remote(subscription).await {
            Ok(()) => {
                warn!(
                    remote_id = %subscription.remote_subscription_id,
                    error = %store_err,
                    "Subscription not persisted, remote hook removed"
                );
                ServerError::Storage(store_err)
            }
            Err(delete_err) => {
                error!(
                    user = %subscription.owner_user_id,
                    organization = %subscription.organization_name,
                    project = %subscription.project_name,
                    remote_id = %subscription.remote_subscription_id,
                    store_error = %store_err,
                    delete_error = %delete_err,
                    "Remote hook orphaned"
                );
                ServerError::OrphanedRemoteSubscription {
                    remote_subscription_id: subscription.remote_subscription_id.clone(),
                    organization: subscription.organization_name.clone(),
                    project: subscription.project_name.clone(),
                    cause: format!("{store_err}; compensating delete failed: {delete_err}"),
                }
            }
        }
    }
}
