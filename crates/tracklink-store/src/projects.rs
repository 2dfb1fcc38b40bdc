//! Linked-project persistence.

use crate::database::Database;
use crate::error::Result;
use crate::models::LinkedProject;

const KEY_PREFIX: &str = "projects_";

/// Durable mapping from a user to the projects they have linked.
///
/// Implementations persist and retrieve; they never check for duplicates.
pub trait ProjectStore: Send + Sync {
    /// All projects linked by `user_id`, in insertion order. Unknown users
    /// have no projects.
    fn get_all_projects(&self, user_id: &str) -> Result<Vec<LinkedProject>>;

    /// Append `project` to its owner's set.
    fn store_project(&self, project: &LinkedProject) -> Result<()>;

    /// Remove every entry sharing `project`'s identity. Deleting an absent
    /// project is not an error.
    fn delete_project(&self, project: &LinkedProject) -> Result<()>;
}

fn key_for(user_id: &str) -> String {
    format!("{KEY_PREFIX}{user_id}")
}

impl ProjectStore for Database {
    fn get_all_projects(&self, user_id: &str) -> Result<Vec<LinkedProject>> {
        self.load_list(&key_for(user_id))
    }

    fn store_project(&self, project: &LinkedProject) -> Result<()> {
        self.update_list(
            &key_for(&project.owner_user_id),
            |list: &mut Vec<LinkedProject>| list.push(project.clone()),
        )?;
        tracing::debug!(
            user = %project.owner_user_id,
            organization = %project.organization_name,
            project = %project.project_name,
            "stored linked project"
        );
        Ok(())
    }

    fn delete_project(&self, project: &LinkedProject) -> Result<()> {
        self.update_list(
            &key_for(&project.owner_user_id),
            |list: &mut Vec<LinkedProject>| list.retain(|p| !p.same_project(project)),
        )
    }
}
