//! Work item creation requests.

use serde::{Deserialize, Serialize};

use crate::error::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub organization: String,
    pub project: String,
    /// Work item type, e.g. `Task`, `Bug`, `Epic`.
    #[serde(rename = "type")]
    pub task_type: String,
    pub fields: TaskFields,
}

impl TaskRequest {
    pub fn validate(&self) -> Result<(), ServerError> {
        let required = [
            ("organization", &self.organization),
            ("project", &self.project),
            ("type", &self.task_type),
            ("fields.title", &self.fields.title),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ServerError::BadRequest(format!("{name} is required")));
            }
        }
        Ok(())
    }
}

/// A work item the remote service created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub id: i64,
    pub title: String,
    /// Browser link to the work item; may be empty.
    #[serde(default)]
    pub link: String,
}

/// Direct message confirming a created work item.
pub fn confirmation_message(request: &TaskRequest, task: &CreatedTask) -> String {
    let reference = if task.link.is_empty() {
        format!("#{}", task.id)
    } else {
        format!("[#{}]({})", task.id, task.link)
    };
    format!(
        "{} {} **{}** was created in `{}/{}`.",
        request.task_type, reference, task.title, request.organization, request.project
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str) -> TaskRequest {
        TaskRequest {
            organization: "org".into(),
            project: "proj".into(),
            task_type: "Bug".into(),
            fields: TaskFields {
                title: title.into(),
                description: String::new(),
            },
        }
    }

    #[test]
    fn test_missing_title_is_rejected() {
        assert!(request("  ").validate().is_err());
        assert!(request("Crash on start").validate().is_ok());
    }

    #[test]
    fn test_confirmation_links_when_possible() {
        let task = CreatedTask {
            id: 42,
            title: "Crash on start".into(),
            link: "https://dev.azure.com/org/proj/_workitems/edit/42".into(),
        };
        let message = confirmation_message(&request("Crash on start"), &task);
        assert_eq!(
            message,
            "Bug [#42](https://dev.azure.com/org/proj/_workitems/edit/42) **Crash on start** \
             was created in `org/proj`."
        );

        let unlinked = CreatedTask { link: String::new(), ..task };
        assert!(confirmation_message(&request("x"), &unlinked).starts_with("Bug #42 "));
    }
}
