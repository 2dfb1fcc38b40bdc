//! Subscription persistence.

use crate::database::Database;
use crate::error::Result;
use crate::models::Subscription;

const KEY_PREFIX: &str = "subscriptions_";

/// Durable mapping from a user to the subscriptions they have created.
pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions of `user_id`, in insertion order.
    fn get_all_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>>;

    /// Append `subscription` to its owner's set.
    fn store_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Remove every entry sharing `subscription`'s identity. Idempotent.
    fn delete_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Subscriptions of `user_id` on projects named `project_name`.
    ///
    /// Filters the full set in memory; order is preserved.
    fn get_subscriptions_for_project(
        &self,
        user_id: &str,
        project_name: &str,
    ) -> Result<Vec<Subscription>> {
        let mut all = self.get_all_subscriptions(user_id)?;
        all.retain(|s| s.project_name == project_name);
        Ok(all)
    }
}

fn key_for(user_id: &str) -> String {
    format!("{KEY_PREFIX}{user_id}")
}

impl SubscriptionStore for Database {
    fn get_all_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        self.load_list(&key_for(user_id))
    }

    fn store_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.update_list(
            &key_for(&subscription.owner_user_id),
            |list: &mut Vec<Subscription>| list.push(subscription.clone()),
        )?;
        tracing::debug!(
            user = %subscription.owner_user_id,
            project = %subscription.project_name,
            event = %subscription.event_type,
            channel = %subscription.channel_id,
            remote_id = %subscription.remote_subscription_id,
            "stored subscription"
        );
        Ok(())
    }

    fn delete_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.update_list(
            &key_for(&subscription.owner_user_id),
            |list: &mut Vec<Subscription>| list.retain(|s| !s.same_subscription(subscription)),
        )
    }
}
