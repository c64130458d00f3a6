// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits defined in
//! `domain::repository`. In-memory implementations here back tests and
//! local development; PostgreSQL implementations live one file per
//! aggregate alongside this module.

pub mod postgres_anonymous_session;
pub mod postgres_approval;
pub mod postgres_credential;
pub mod postgres_policy;
pub mod postgres_task;
pub mod postgres_task_event;
pub mod postgres_tool_source;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::anonymous_session::AnonymousSession;
use crate::domain::approval::{Approval, ApprovalStatus, NewApproval};
use crate::domain::credential::{Credential, CredentialScope, UpsertCredential};
use crate::domain::event::{NewTaskEvent, TaskEvent};
use crate::domain::ids::{ActorId, ApprovalId, TaskId, WorkspaceId};
use crate::domain::policy::AccessPolicy;
use crate::domain::repository::{
    AnonymousSessionRepository, ApprovalRepository, CredentialRepository, PolicyRepository,
    RepositoryError, TaskEventRepository, TaskRepository, ToolSourceRepository,
};
use crate::domain::task::{NewTask, Task, TaskResult, TaskStatus};
use crate::domain::tool::{ToolSource, UpsertToolSource};

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, params: NewTask) -> Result<Task, RepositoryError> {
        let task = Task::new(TaskId::new(), params, chrono::Utc::now());
        self.tasks.write().unwrap().insert(task.id, task.clone());
        Ok(task)
    }

    async fn get(&self, id: TaskId, workspace_id: Option<WorkspaceId>) -> Result<Option<Task>, RepositoryError> {
        let tasks = self.tasks.read().unwrap();
        Ok(tasks
            .get(&id)
            .filter(|t| workspace_id.map(|w| t.workspace_id == w).unwrap_or(true))
            .cloned())
    }

    async fn list(&self, workspace_id: WorkspaceId, limit: i64) -> Result<Vec<Task>, RepositoryError> {
        let tasks = self.tasks.read().unwrap();
        let mut matching: Vec<Task> = tasks.values().filter(|t| t.workspace_id == workspace_id).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn mark_running(&self, id: TaskId) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write().unwrap();
        if let Some(task) = tasks.get_mut(&id) {
            let _ = task.mark_running(chrono::Utc::now());
        }
        Ok(())
    }

    async fn mark_finished(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: TaskResult,
    ) -> Result<bool, RepositoryError> {
        let mut tasks = self.tasks.write().unwrap();
        let Some(task) = tasks.get_mut(&id) else {
            return Ok(false);
        };
        Ok(task.mark_finished(status, result, chrono::Utc::now()).is_ok())
    }

    async fn fail_all_running(&self, error: &str) -> Result<u64, RepositoryError> {
        let mut tasks = self.tasks.write().unwrap();
        let mut count = 0;
        for task in tasks.values_mut() {
            if !task.status.is_terminal() {
                let result = TaskResult {
                    error: Some(error.to_string()),
                    ..Default::default()
                };
                if task.mark_finished(TaskStatus::Failed, result, chrono::Utc::now()).is_ok() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

#[derive(Default)]
pub struct InMemoryApprovalRepository {
    approvals: RwLock<HashMap<ApprovalId, Approval>>,
    /// Mirrors the `JOIN tasks` the Postgres repository runs to scope an
    /// approval to its task's workspace (approvals carry no `workspace_id`
    /// column of their own).
    workspace_ids: RwLock<HashMap<ApprovalId, WorkspaceId>>,
}

impl InMemoryApprovalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn create(&self, params: NewApproval) -> Result<Approval, RepositoryError> {
        let workspace_id = params.workspace_id;
        let approval = Approval::new(ApprovalId::new(), params, chrono::Utc::now());
        self.approvals.write().unwrap().insert(approval.id, approval.clone());
        self.workspace_ids.write().unwrap().insert(approval.id, workspace_id);
        Ok(approval)
    }

    async fn resolve(
        &self,
        id: ApprovalId,
        decision: ApprovalStatus,
        reviewer_id: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>, RepositoryError> {
        let mut approvals = self.approvals.write().unwrap();
        let Some(approval) = approvals.get_mut(&id) else {
            return Ok(None);
        };
        if approval.resolve(decision, reviewer_id, reason, chrono::Utc::now()).is_err() {
            return Ok(None);
        }
        Ok(Some(approval.clone()))
    }

    async fn list_pending(&self, workspace_id: WorkspaceId) -> Result<Vec<Approval>, RepositoryError> {
        let workspace_ids = self.workspace_ids.read().unwrap();
        let approvals = self.approvals.read().unwrap();
        let mut matching: Vec<Approval> = approvals
            .values()
            .filter(|a| a.status == ApprovalStatus::Pending && workspace_ids.get(&a.id) == Some(&workspace_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn get_in_workspace(
        &self,
        id: ApprovalId,
        workspace_id: WorkspaceId,
    ) -> Result<Option<Approval>, RepositoryError> {
        if self.workspace_ids.read().unwrap().get(&id) != Some(&workspace_id) {
            return Ok(None);
        }
        Ok(self.approvals.read().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    policies: RwLock<HashMap<uuid::Uuid, AccessPolicy>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn upsert(&self, mut policy: AccessPolicy) -> Result<AccessPolicy, RepositoryError> {
        if policy.id.is_nil() {
            policy.id = uuid::Uuid::new_v4();
        }
        self.policies.write().unwrap().insert(policy.id, policy.clone());
        Ok(policy)
    }

    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<AccessPolicy>, RepositoryError> {
        Ok(self
            .policies
            .read()
            .unwrap()
            .values()
            .filter(|p| p.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: uuid::Uuid, workspace_id: WorkspaceId) -> Result<(), RepositoryError> {
        let mut policies = self.policies.write().unwrap();
        if policies.get(&id).map(|p| p.workspace_id == workspace_id).unwrap_or(false) {
            policies.remove(&id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    credentials: RwLock<HashMap<(WorkspaceId, String, CredentialScope, String), Credential>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(workspace_id: WorkspaceId, source_key: &str, scope: CredentialScope, actor_id: &Option<ActorId>) -> (WorkspaceId, String, CredentialScope, String) {
        (workspace_id, source_key.to_string(), scope, actor_id.as_ref().map(|a| a.0.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn upsert(&self, params: UpsertCredential) -> Result<Credential, RepositoryError> {
        let now = chrono::Utc::now();
        let key = Self::key(params.workspace_id, &params.source_key, params.scope, &params.actor_id);
        let mut credentials = self.credentials.write().unwrap();
        let created_at = credentials.get(&key).map(|c| c.created_at).unwrap_or(now);
        let credential = Credential {
            workspace_id: params.workspace_id,
            source_key: params.source_key,
            scope: params.scope,
            actor_id: params.actor_id,
            secret_json: params.secret_json,
            provider: params.provider,
            created_at,
            updated_at: now,
        };
        credentials.insert(key, credential.clone());
        Ok(credential)
    }

    async fn resolve(
        &self,
        workspace_id: WorkspaceId,
        source_key: &str,
        scope: CredentialScope,
        actor_id: Option<ActorId>,
    ) -> Result<Option<Credential>, RepositoryError> {
        let key = Self::key(workspace_id, source_key, scope, &actor_id);
        Ok(self.credentials.read().unwrap().get(&key).cloned())
    }

    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<Credential>, RepositoryError> {
        Ok(self
            .credentials
            .read()
            .unwrap()
            .values()
            .filter(|c| c.workspace_id == workspace_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryToolSourceRepository {
    sources: RwLock<HashMap<(WorkspaceId, String), ToolSource>>,
}

impl InMemoryToolSourceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolSourceRepository for InMemoryToolSourceRepository {
    async fn upsert(&self, params: UpsertToolSource) -> Result<ToolSource, RepositoryError> {
        let now = chrono::Utc::now();
        let key = (params.workspace_id, params.name.clone());
        let mut sources = self.sources.write().unwrap();
        let created_at = sources.get(&key).map(|s| s.created_at).unwrap_or(now);
        let source = ToolSource {
            workspace_id: params.workspace_id,
            name: params.name,
            r#type: params.r#type,
            config: params.config,
            enabled: params.enabled,
            created_at,
            updated_at: now,
        };
        sources.insert(key, source.clone());
        Ok(source)
    }

    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<ToolSource>, RepositoryError> {
        Ok(self
            .sources
            .read()
            .unwrap()
            .values()
            .filter(|s| s.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, workspace_id: WorkspaceId, name: &str) -> Result<(), RepositoryError> {
        self.sources.write().unwrap().remove(&(workspace_id, name.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTaskEventRepository {
    events: RwLock<HashMap<TaskId, Vec<TaskEvent>>>,
    next_id: RwLock<i64>,
}

impl InMemoryTaskEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskEventRepository for InMemoryTaskEventRepository {
    async fn append(&self, event: NewTaskEvent) -> Result<TaskEvent, RepositoryError> {
        let mut next_id = self.next_id.write().unwrap();
        *next_id += 1;
        let stored = TaskEvent {
            id: *next_id,
            task_id: event.task_id,
            event_name: event.event_name,
            r#type: event.r#type,
            payload: event.payload,
            created_at: chrono::Utc::now(),
        };
        self.events.write().unwrap().entry(event.task_id).or_default().push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, task_id: TaskId) -> Result<Vec<TaskEvent>, RepositoryError> {
        Ok(self.events.read().unwrap().get(&task_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryAnonymousSessionRepository {
    sessions: RwLock<HashMap<String, AnonymousSession>>,
}

impl InMemoryAnonymousSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnonymousSessionRepository for InMemoryAnonymousSessionRepository {
    async fn bootstrap(&self, session_id: Option<String>) -> Result<AnonymousSession, RepositoryError> {
        let now = chrono::Utc::now();
        let mut sessions = self.sessions.write().unwrap();
        if let Some(id) = session_id {
            if let Some(existing) = sessions.get_mut(&id) {
                existing.touch(now);
                return Ok(existing.clone());
            }
            let session = AnonymousSession::new(id, now);
            sessions.insert(session.session_id.clone(), session.clone());
            return Ok(session);
        }
        let session = AnonymousSession::new(uuid::Uuid::new_v4().to_string(), now);
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(session)
    }
}
