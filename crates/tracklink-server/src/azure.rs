//! Azure DevOps REST adapter for [`SubscriptionGateway`] and [`TaskGateway`].
//!
//! Authentication is a personal access token sent as HTTP basic auth with an
//! empty user name. Every call is a single request bounded by the configured
//! timeout.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use tracklink_shared::constants::{
    CHANNEL_ID_PARAM, HOOKS_API_VERSION, HOOKS_CONSUMER_ACTION_ID, HOOKS_CONSUMER_ID,
    HOOKS_PUBLISHER_ID, HOOKS_RESOURCE_VERSION, NOTIFICATION_PATH, PROJECTS_API_VERSION,
    WORK_ITEMS_API_VERSION,
};
use tracklink_shared::events::EventType;
use tracklink_store::LinkedProject;

use crate::config::ServerConfig;
use crate::gateway::{GatewayError, RemoteProject, SubscriptionGateway, TaskGateway};
use crate::tasks::{CreatedTask, TaskRequest};

pub struct AzureDevOpsClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    /// Base of the callback URL registered with each service hook.
    public_url: String,
}

#[derive(Deserialize)]
struct ProjectResponse {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct SubscriptionResponse {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct WorkItemResponse {
    id: i64,
    #[serde(default)]
    fields: Value,
    #[serde(rename = "_links", default)]
    links: Value,
}

impl AzureDevOpsClient {
    pub fn new(config: &ServerConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.azure_devops_url.trim_end_matches('/').to_string(),
            token: config.azure_devops_token.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL the remote service calls for events destined to `channel_id`.
    pub fn callback_url(&self, channel_id: &str) -> String {
        format!(
            "{}{}?{}={}",
            self.public_url,
            NOTIFICATION_PATH,
            CHANNEL_ID_PARAM,
            urlencoding::encode(channel_id)
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.basic_auth("", Some(token)),
            None => builder,
        }
    }

    fn org_url(&self, organization: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(organization))
    }

    async fn check(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

/// Pull the `message` out of an Azure error body, falling back to the raw text.
async fn error_message(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body)
}

#[async_trait]
impl SubscriptionGateway for AzureDevOpsClient {
    async fn describe_project(
        &self,
        organization: &str,
        project: &str,
    ) -> Result<RemoteProject, GatewayError> {
        let url = format!(
            "{}/_apis/projects/{}?api-version={}",
            self.org_url(organization),
            urlencoding::encode(project),
            PROJECTS_API_VERSION
        );
        let response = Self::check(self.request(Method::GET, url).send().await?).await?;
        let project: ProjectResponse = response.json().await?;
        debug!(id = %project.id, name = %project.name, "Described project");
        Ok(RemoteProject {
            id: project.id,
            name: project.name,
        })
    }

    async fn create_subscription(
        &self,
        project: &LinkedProject,
        event_type: EventType,
        channel_id: &str,
    ) -> Result<String, GatewayError> {
        let url = format!(
            "{}/_apis/hooks/subscriptions?api-version={}",
            self.org_url(&project.organization_name),
            HOOKS_API_VERSION
        );
        let body = json!({
            "publisherId": HOOKS_PUBLISHER_ID,
            "eventType": event_type.as_str(),
            "resourceVersion": HOOKS_RESOURCE_VERSION,
            "consumerId": HOOKS_CONSUMER_ID,
            "consumerActionId": HOOKS_CONSUMER_ACTION_ID,
            "publisherInputs": {
                "projectId": project.project_id,
            },
            "consumerInputs": {
                "url": self.callback_url(channel_id),
            },
        });

        let response =
            Self::check(self.request(Method::POST, url).json(&body).send().await?).await?;
        let created: SubscriptionResponse = response.json().await?;
        info!(
            organization = %project.organization_name,
            project = %project.project_name,
            event = %event_type,
            remote_id = %created.id,
            "Registered service hook"
        );
        Ok(created.id)
    }

    async fn delete_subscription(
        &self,
        organization: &str,
        project: &str,
        remote_subscription_id: &str,
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/_apis/hooks/subscriptions/{}?api-version={}",
            self.org_url(organization),
            urlencoding::encode(remote_subscription_id),
            HOOKS_API_VERSION
        );
        match Self::check(self.request(Method::DELETE, url).send().await?).await {
            Ok(_) => {
                info!(
                    %organization,
                    %project,
                    remote_id = %remote_subscription_id,
                    "Removed service hook"
                );
                Ok(())
            }
            Err(GatewayError::NotFound) => {
                debug!(remote_id = %remote_subscription_id, "Service hook already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl TaskGateway for AzureDevOpsClient {
    async fn create_task(&self, request: &TaskRequest) -> Result<CreatedTask, GatewayError> {
        let url = format!(
            "{}/{}/_apis/wit/workitems/${}?api-version={}",
            self.org_url(&request.organization),
            urlencoding::encode(&request.project),
            urlencoding::encode(&request.task_type),
            WORK_ITEMS_API_VERSION
        );

        let mut operations = vec![json!({
            "op": "add",
            "path": "/fields/System.Title",
            "value": request.fields.title,
        })];
        if !request.fields.description.is_empty() {
            operations.push(json!({
                "op": "add",
                "path": "/fields/System.Description",
                "value": request.fields.description,
            }));
        }

        let response = self
            .request(Method::POST, url)
            .header("Content-Type", "application/json-patch+json")
            .body(serde_json::to_vec(&operations).map_err(|e| GatewayError::Decode(e.to_string()))?)
            .send()
            .await?;
        let item: WorkItemResponse = Self::check(response).await?.json().await?;

        let title = item
            .fields
            .get("System.Title")
            .and_then(Value::as_str)
            .unwrap_or(request.fields.title.as_str())
            .to_string();
        let link = item
            .links
            .pointer("/html/href")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        info!(
            id = item.id,
            organization = %request.organization,
            project = %request.project,
            "Created work item"
        );
        Ok(CreatedTask {
            id: item.id,
            title,
            link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AzureDevOpsClient {
        let config = ServerConfig {
            azure_devops_url: server.uri(),
            azure_devops_token: Some("pat".into()),
            public_url: "https://hooks.example.com".into(),
            ..ServerConfig::default()
        };
        AzureDevOpsClient::new(&config).unwrap()
    }

    fn linked() -> LinkedProject {
        LinkedProject::new("u1", "contoso", "Fabrikam", "proj-guid")
    }

    #[tokio::test]
    async fn test_describe_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/projects/Fabrikam"))
            .and(query_param("api-version", PROJECTS_API_VERSION))
            // base64(":pat")
            .and(header("authorization", "Basic OnBhdA=="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "proj-guid",
                "name": "Fabrikam",
                "state": "wellFormed"
            })))
            .mount(&server)
            .await;

        let project = client_for(&server)
            .describe_project("contoso", "Fabrikam")
            .await
            .unwrap();
        assert_eq!(
            project,
            RemoteProject {
                id: "proj-guid".into(),
                name: "Fabrikam".into()
            }
        );
    }

    #[tokio::test]
    async fn test_describe_missing_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .describe_project("contoso", "Nope")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound));
    }

    #[tokio::test]
    async fn test_create_subscription_registers_callback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso/_apis/hooks/subscriptions"))
            .and(body_partial_json(json!({
                "eventType": "workitem.created",
                "publisherInputs": { "projectId": "proj-guid" },
                "consumerInputs": { "url": "https://hooks.example.com/notification?channelID=C1" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "sub-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .create_subscription(&linked(), EventType::WorkItemCreated, "C1")
            .await
            .unwrap();
        assert_eq!(id, "sub-1");
    }

    #[tokio::test]
    async fn test_create_subscription_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "token expired" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_subscription(&linked(), EventType::CodePushed, "C1")
            .await
            .unwrap_err();
        match err {
            GatewayError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "token expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_treats_missing_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/contoso/_apis/hooks/subscriptions/sub-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .delete_subscription("contoso", "Fabrikam", "sub-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .delete_subscription("contoso", "Fabrikam", "sub-1")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = ServerConfig {
            azure_devops_url: server.uri(),
            upstream_timeout: std::time::Duration::from_millis(50),
            ..ServerConfig::default()
        };
        let err = AzureDevOpsClient::new(&config)
            .unwrap()
            .describe_project("contoso", "Fabrikam")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_create_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso/Fabrikam/_apis/wit/workitems/$Bug"))
            .and(header("content-type", "application/json-patch+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7,
                "fields": { "System.Title": "Crash on start" },
                "_links": { "html": { "href": "https://dev.azure.com/contoso/_workitems/edit/7" } }
            })))
            .mount(&server)
            .await;

        let request = TaskRequest {
            organization: "contoso".into(),
            project: "Fabrikam".into(),
            task_type: "Bug".into(),
            fields: crate::tasks::TaskFields {
                title: "Crash on start".into(),
                description: "Steps to reproduce".into(),
            },
        };
        let task = client_for(&server).create_task(&request).await.unwrap();
        assert_eq!(
            task,
            CreatedTask {
                id: 7,
                title: "Crash on start".into(),
                link: "https://dev.azure.com/contoso/_workitems/edit/7".into(),
            }
        );
    }

    #[test]
    fn test_callback_url_encodes_channel() {
        let config = ServerConfig {
            public_url: "https://hooks.example.com".into(),
            ..ServerConfig::default()
        };
        let client = AzureDevOpsClient::new(&config).unwrap();
        assert_eq!(
            client.callback_url("a b"),
            "https://hooks.example.com/notification?channelID=a%20b"
        );
    }
}
