//! In-process fakes of the store, gateway and chat seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tracklink_shared::events::EventType;
use tracklink_store::{
    Database, LinkedProject, ProjectStore, Result as StoreResult, StoreError, Subscription,
    SubscriptionStore,
};

use crate::chat::{Channel, ChatError, ChatPlatform, Post};
use crate::gateway::{GatewayError, RemoteProject, SubscriptionGateway, TaskGateway};
use crate::tasks::{CreatedTask, TaskRequest};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory SQLite store whose reads and writes can be made to fail.
pub struct FlakyStore {
    db: Database,
    fail_reads: AtomicBool,
    reject_project_writes: AtomicBool,
    reject_subscription_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            db: Database::open_in_memory().unwrap(),
            fail_reads: AtomicBool::new(false),
            reject_project_writes: AtomicBool::new(false),
            reject_subscription_writes: AtomicBool::new(false),
        }
    }

    /// Make every project and subscription read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn reject_project_writes(&self, reject: bool) {
        self.reject_project_writes.store(reject, Ordering::SeqCst);
    }

    pub fn reject_subscription_writes(&self, reject: bool) {
        self.reject_subscription_writes
            .store(reject, Ordering::SeqCst);
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::LockPoisoned);
        }
        Ok(())
    }

    fn check_write(flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected("disk full".into()));
        }
        Ok(())
    }
}

impl ProjectStore for FlakyStore {
    fn get_all_projects(&self, user_id: &str) -> StoreResult<Vec<LinkedProject>> {
        self.check_read()?;
        self.db.get_all_projects(user_id)
    }

    fn store_project(&self, project: &LinkedProject) -> StoreResult<()> {
        Self::check_write(&self.reject_project_writes)?;
        self.db.store_project(project)
    }

    fn delete_project(&self, project: &LinkedProject) -> StoreResult<()> {
        Self::check_write(&self.reject_project_writes)?;
        self.db.delete_project(project)
    }
}

impl SubscriptionStore for FlakyStore {
    fn get_all_subscriptions(&self, user_id: &str) -> StoreResult<Vec<Subscription>> {
        self.check_read()?;
        self.db.get_all_subscriptions(user_id)
    }

    fn store_subscription(&self, subscription: &Subscription) -> StoreResult<()> {
        Self::check_write(&self.reject_subscription_writes)?;
        self.db.store_subscription(subscription)
    }

    fn delete_subscription(&self, subscription: &Subscription) -> StoreResult<()> {
        Self::check_write(&self.reject_subscription_writes)?;
        self.db.delete_subscription(subscription)
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Remote service double. Projects must be registered with
/// [`FakeGateway::with_project`] before they can be described.
#[derive(Default)]
pub struct FakeGateway {
    projects: Mutex<HashMap<(String, String), String>>,
    /// Remote subscriptions currently registered.
    pub live: Mutex<HashSet<String>>,
    /// Remote ids whose deletion fails with a 500.
    failing_deletes: Mutex<HashSet<String>>,
    fail_create: Mutex<Option<GatewayError>>,
    fail_all_deletes: AtomicBool,
    empty_ids: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
    next_id: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, organization: &str, project: &str, id: &str) -> Self {
        self.projects
            .lock()
            .unwrap()
            .insert((organization.into(), project.into()), id.into());
        self
    }

    pub fn fail_create_with(&self, err: GatewayError) {
        *self.fail_create.lock().unwrap() = Some(err);
    }

    pub fn fail_delete_of(&self, remote_id: &str) {
        self.failing_deletes.lock().unwrap().insert(remote_id.into());
    }

    pub fn fail_all_deletes(&self) {
        self.fail_all_deletes.store(true, Ordering::SeqCst);
    }

    pub fn return_empty_ids(&self) {
        self.empty_ids.store(true, Ordering::SeqCst);
    }

    pub fn delay_creates(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

fn clone_error(err: &GatewayError) -> GatewayError {
    match err {
        GatewayError::NotFound => GatewayError::NotFound,
        GatewayError::Status { status, message } => GatewayError::Status {
            status: *status,
            message: message.clone(),
        },
        GatewayError::Timeout(m) => GatewayError::Timeout(m.clone()),
        GatewayError::Transport(m) => GatewayError::Transport(m.clone()),
        GatewayError::Decode(m) => GatewayError::Decode(m.clone()),
    }
}

#[async_trait]
impl SubscriptionGateway for FakeGateway {
    async fn describe_project(
        &self,
        organization: &str,
        project: &str,
    ) -> Result<RemoteProject, GatewayError> {
        let projects = self.projects.lock().unwrap();
        projects
            .get(&(organization.to_string(), project.to_string()))
            .map(|id| RemoteProject {
                id: id.clone(),
                name: project.to_string(),
            })
            .ok_or(GatewayError::NotFound)
    }

    async fn create_subscription(
        &self,
        _project: &LinkedProject,
        _event_type: EventType,
        _channel_id: &str,
    ) -> Result<String, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.fail_create.lock().unwrap().as_ref() {
            return Err(clone_error(err));
        }
        if self.empty_ids.load(Ordering::SeqCst) {
            return Ok(String::new());
        }
        let id = format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.live.lock().unwrap().insert(id.clone());
        Ok(id)
    }

    async fn delete_subscription(
        &self,
        _organization: &str,
        _project: &str,
        remote_subscription_id: &str,
    ) -> Result<(), GatewayError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all_deletes.load(Ordering::SeqCst)
            || self
                .failing_deletes
                .lock()
                .unwrap()
                .contains(remote_subscription_id)
        {
            return Err(GatewayError::Status {
                status: 500,
                message: "remote unavailable".into(),
            });
        }
        self.live.lock().unwrap().remove(remote_subscription_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTasks {
    pub fail: AtomicBool,
    pub created: Mutex<Vec<TaskRequest>>,
}

#[async_trait]
impl TaskGateway for FakeTasks {
    async fn create_task(&self, request: &TaskRequest) -> Result<CreatedTask, GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Status {
                status: 400,
                message: "unknown work item type".into(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        Ok(CreatedTask {
            id: created.len() as i64,
            title: request.fields.title.clone(),
            link: String::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Chat double that records posts and serves a fixed channel list.
#[derive(Default)]
pub struct RecordingChat {
    pub posts: Mutex<Vec<Post>>,
    pub fail_posts: AtomicBool,
    channels: Mutex<Vec<Channel>>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(self, id: &str, channel_type: &str, team_id: &str) -> Self {
        self.channels.lock().unwrap().push(Channel {
            id: id.into(),
            channel_type: channel_type.into(),
            name: id.to_lowercase(),
            display_name: id.into(),
            team_id: team_id.into(),
        });
        self
    }

    pub fn posted(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for RecordingChat {
    async fn create_post(&self, post: &Post) -> Result<(), ChatError> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(ChatError::Api {
                status: 403,
                message: "bot is not a channel member".into(),
            });
        }
        self.posts.lock().unwrap().push(post.clone());
        Ok(())
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, ChatError> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or(ChatError::NotFound)
    }

    async fn get_direct_channel(&self, user_a: &str, user_b: &str) -> Result<Channel, ChatError> {
        Ok(Channel {
            id: format!("{user_a}__{user_b}"),
            channel_type: "D".into(),
            name: String::new(),
            display_name: String::new(),
            team_id: String::new(),
        })
    }

    async fn get_channels_for_team_for_user(
        &self,
        team_id: &str,
        _user_id: &str,
    ) -> Result<Vec<Channel>, ChatError> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.team_id == team_id)
            .cloned()
            .collect())
    }
}

/// Shared handles for wiring fakes into a [`crate::reconcile::Reconciler`].
pub fn shared_store() -> Arc<FlakyStore> {
    Arc::new(FlakyStore::new())
}
