// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The thin surface (§4.10) every transport (HTTP, CLI, SDK) is built on.
//! Transport-free: callers get plain Rust types back, never a wire format.
//! Every task/approval lookup refuses cross-workspace access as `not_found`
//! rather than `forbidden`, so a caller can't use the error variant to
//! enumerate ids it doesn't own.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::anonymous_session::AnonymousSession;
use crate::domain::approval::{Approval, ApprovalStatus};
use crate::domain::event::TaskEvent;
use crate::domain::ids::{ActorId, ApprovalId, ClientId, TaskId, WorkspaceId};
use crate::domain::repository::{AnonymousSessionRepository, ApprovalRepository, RepositoryError, TaskEventRepository, TaskRepository};
use crate::domain::task::{NewTask, Task};
use crate::infrastructure::event_bus::{EventBus, EventSubscription, SubscriberMessage};

use super::approval_coordinator::ApprovalCoordinator;
use super::task_scheduler::TaskScheduler;

const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_LIST_LIMIT: i64 = 500;
const DEFAULT_RUNTIME_ID: &str = "docker";

pub struct ControlPlane {
    tasks: Arc<dyn TaskRepository>,
    approvals: Arc<dyn ApprovalRepository>,
    task_events: Arc<dyn TaskEventRepository>,
    anonymous_sessions: Arc<dyn AnonymousSessionRepository>,
    event_bus: Arc<EventBus>,
    scheduler: Arc<TaskScheduler>,
    approval_coordinator: Arc<ApprovalCoordinator>,
}

#[derive(Debug, Default)]
pub struct CreateTaskParams {
    pub actor_id: Option<ActorId>,
    pub client_id: Option<ClientId>,
    pub runtime_id: Option<String>,
    pub timeout_ms: Option<u64>,
    pub metadata: Option<HashMap<String, Value>>,
}

impl ControlPlane {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        approvals: Arc<dyn ApprovalRepository>,
        task_events: Arc<dyn TaskEventRepository>,
        anonymous_sessions: Arc<dyn AnonymousSessionRepository>,
        event_bus: Arc<EventBus>,
        scheduler: Arc<TaskScheduler>,
        approval_coordinator: Arc<ApprovalCoordinator>,
    ) -> Self {
        Self {
            tasks,
            approvals,
            task_events,
            anonymous_sessions,
            event_bus,
            scheduler,
            approval_coordinator,
        }
    }

    pub async fn create_task(
        &self,
        workspace_id: WorkspaceId,
        code: String,
        params: CreateTaskParams,
    ) -> Result<Task, RepositoryError> {
        self.scheduler
            .create_task(NewTask {
                workspace_id,
                actor_id: params.actor_id,
                client_id: params.client_id,
                code,
                runtime_id: params.runtime_id.unwrap_or_else(|| DEFAULT_RUNTIME_ID.to_string()),
                timeout_ms: params.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
                metadata: params.metadata.unwrap_or_default(),
            })
            .await
    }

    pub async fn get_task(&self, task_id: TaskId, workspace_id: WorkspaceId) -> Result<Task, RepositoryError> {
        self.tasks
            .get(task_id, Some(workspace_id))
            .await?
            .ok_or_else(|| RepositoryError::NotFound(task_id.to_string()))
    }

    pub async fn list_tasks(&self, workspace_id: WorkspaceId) -> Result<Vec<Task>, RepositoryError> {
        self.tasks.list(workspace_id, DEFAULT_LIST_LIMIT).await
    }

    /// Live subscription preceded by store replay (§4.2): subscribes to the
    /// bus first so nothing published during the backlog fetch is missed,
    /// then fetches `ListTaskEvents` and dedupes the overlap by event id.
    pub async fn subscribe(&self, task_id: TaskId, workspace_id: WorkspaceId) -> Result<TaskEventStream, RepositoryError> {
        self.get_task(task_id, workspace_id).await?;

        let subscription = self.event_bus.subscribe(task_id);
        let backlog = self.task_events.list(task_id).await?;
        let last_seen_id = backlog.last().map(|e| e.id).unwrap_or(0);

        Ok(TaskEventStream {
            backlog: backlog.into_iter(),
            subscription,
            last_seen_id,
        })
    }

    pub async fn list_pending_approvals(&self, workspace_id: WorkspaceId) -> Result<Vec<Approval>, RepositoryError> {
        self.approvals.list_pending(workspace_id).await
    }

    pub async fn resolve_approval(
        &self,
        workspace_id: WorkspaceId,
        approval_id: ApprovalId,
        decision: ApprovalStatus,
        reviewer_id: Option<String>,
        reason: Option<String>,
    ) -> Result<Approval, RepositoryError> {
        self.approvals
            .get_in_workspace(approval_id, workspace_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(approval_id.to_string()))?;

        self.approval_coordinator
            .resolve(approval_id, decision, reviewer_id, reason)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(approval_id.to_string()))
    }

    pub async fn bootstrap_anonymous_context(&self, session_id: Option<String>) -> Result<AnonymousSession, RepositoryError> {
        self.anonymous_sessions.bootstrap(session_id).await
    }
}

pub struct TaskEventStream {
    backlog: std::vec::IntoIter<TaskEvent>,
    subscription: EventSubscription,
    last_seen_id: i64,
}

impl TaskEventStream {
    pub async fn next(&mut self) -> Option<SubscriberMessage> {
        if let Some(event) = self.backlog.next() {
            return Some(SubscriberMessage::Event(event));
        }
        loop {
            match self.subscription.recv().await {
                Some(SubscriberMessage::Event(event)) => {
                    if event.id <= self.last_seen_id {
                        continue;
                    }
                    self.last_seen_id = event.id;
                    return Some(SubscriberMessage::Event(event));
                }
                other => return other,
            }
        }
    }
}
