// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Repository Pattern - Storage Backend Abstraction
//
// One repository trait per aggregate root, a `StorageBackend` enum
// selecting the implementation, and a factory function per trait handing
// back a trait object. In-memory implementations back tests and local
// development; PostgreSQL implementations back everything else.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::anonymous_session::AnonymousSession;
use crate::domain::approval::{Approval, ApprovalStatus, NewApproval};
use crate::domain::credential::{Credential, CredentialScope, UpsertCredential};
use crate::domain::event::{NewTaskEvent, TaskEvent};
use crate::domain::ids::{ActorId, ApprovalId, TaskId, WorkspaceId};
use crate::domain::policy::AccessPolicy;
use crate::domain::task::{NewTask, Task, TaskResult, TaskStatus};
use crate::domain::tool::{ToolSource, UpsertToolSource};

#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, params: NewTask) -> Result<Task, RepositoryError>;
    async fn get(&self, id: TaskId, workspace_id: Option<WorkspaceId>) -> Result<Option<Task>, RepositoryError>;
    async fn list(&self, workspace_id: WorkspaceId, limit: i64) -> Result<Vec<Task>, RepositoryError>;
    async fn mark_running(&self, id: TaskId) -> Result<(), RepositoryError>;
    /// Returns `true` if this call performed the `-> status` transition,
    /// `false` if the task was already terminal (absorbing no-op). Callers
    /// use this to avoid publishing a second terminal event.
    async fn mark_finished(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: TaskResult,
    ) -> Result<bool, RepositoryError>;
    /// Marks every non-terminal task `failed`; used by the boot-time
    /// reconciliation sweep after an unclean restart.
    async fn fail_all_running(&self, error: &str) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn create(&self, params: NewApproval) -> Result<Approval, RepositoryError>;
    async fn resolve(
        &self,
        id: ApprovalId,
        decision: ApprovalStatus,
        reviewer_id: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>, RepositoryError>;
    async fn list_pending(&self, workspace_id: WorkspaceId) -> Result<Vec<Approval>, RepositoryError>;
    async fn get_in_workspace(
        &self,
        id: ApprovalId,
        workspace_id: WorkspaceId,
    ) -> Result<Option<Approval>, RepositoryError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn upsert(&self, policy: AccessPolicy) -> Result<AccessPolicy, RepositoryError>;
    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<AccessPolicy>, RepositoryError>;
    async fn delete(&self, id: uuid::Uuid, workspace_id: WorkspaceId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn upsert(&self, params: UpsertCredential) -> Result<Credential, RepositoryError>;
    async fn resolve(
        &self,
        workspace_id: WorkspaceId,
        source_key: &str,
        scope: CredentialScope,
        actor_id: Option<ActorId>,
    ) -> Result<Option<Credential>, RepositoryError>;
    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<Credential>, RepositoryError>;
}

#[async_trait]
pub trait ToolSourceRepository: Send + Sync {
    async fn upsert(&self, params: UpsertToolSource) -> Result<ToolSource, RepositoryError>;
    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<ToolSource>, RepositoryError>;
    async fn delete(&self, workspace_id: WorkspaceId, name: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TaskEventRepository: Send + Sync {
    async fn append(&self, event: NewTaskEvent) -> Result<TaskEvent, RepositoryError>;
    async fn list(&self, task_id: TaskId) -> Result<Vec<TaskEvent>, RepositoryError>;
}

#[async_trait]
pub trait AnonymousSessionRepository: Send + Sync {
    async fn bootstrap(&self, session_id: Option<String>) -> Result<AnonymousSession, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

pub(crate) fn json_or_null(value: &Value) -> Value {
    if value.is_null() {
        Value::Object(Default::default())
    } else {
        value.clone()
    }
}

use crate::infrastructure::repositories::{
    postgres_anonymous_session::PostgresAnonymousSessionRepository,
    postgres_approval::PostgresApprovalRepository,
    postgres_credential::PostgresCredentialRepository,
    postgres_policy::PostgresPolicyRepository,
    postgres_task::PostgresTaskRepository,
    postgres_task_event::PostgresTaskEventRepository,
    postgres_tool_source::PostgresToolSourceRepository,
    InMemoryAnonymousSessionRepository, InMemoryApprovalRepository, InMemoryCredentialRepository,
    InMemoryPolicyRepository, InMemoryTaskEventRepository, InMemoryTaskRepository,
    InMemoryToolSourceRepository,
};

pub fn create_task_repository(backend: &StorageBackend, pool: sqlx::PgPool) -> Arc<dyn TaskRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryTaskRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresTaskRepository::new(pool)),
    }
}

pub fn create_approval_repository(backend: &StorageBackend, pool: sqlx::PgPool) -> Arc<dyn ApprovalRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryApprovalRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresApprovalRepository::new(pool)),
    }
}

pub fn create_policy_repository(backend: &StorageBackend, pool: sqlx::PgPool) -> Arc<dyn PolicyRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryPolicyRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresPolicyRepository::new(pool)),
    }
}

pub fn create_credential_repository(
    backend: &StorageBackend,
    pool: sqlx::PgPool,
) -> Arc<dyn CredentialRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryCredentialRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresCredentialRepository::new(pool)),
    }
}

pub fn create_tool_source_repository(
    backend: &StorageBackend,
    pool: sqlx::PgPool,
) -> Arc<dyn ToolSourceRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryToolSourceRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresToolSourceRepository::new(pool)),
    }
}

pub fn create_task_event_repository(
    backend: &StorageBackend,
    pool: sqlx::PgPool,
) -> Arc<dyn TaskEventRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryTaskEventRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresTaskEventRepository::new(pool)),
    }
}

pub fn create_anonymous_session_repository(
    backend: &StorageBackend,
    pool: sqlx::PgPool,
) -> Arc<dyn AnonymousSessionRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryAnonymousSessionRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresAnonymousSessionRepository::new(pool)),
    }
}
