// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Promise-per-approval waiter (Design Notes §9). `Await` either observes
//! an already-terminal approval or parks on a one-shot channel until
//! `Resolve` or a timeout-driven `cancel` fires it. Waiters are in-memory
//! only: a kernel restart drops them all, and any task left `running` is
//! finalized `failed` by the boot-time reconciliation sweep rather than
//! resumed here.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::oneshot;

use crate::domain::approval::{Approval, ApprovalStatus};
use crate::domain::event::event_type;
use crate::domain::ids::{ApprovalId, CallId, TaskId, WorkspaceId};
use crate::domain::repository::{ApprovalRepository, RepositoryError};

use super::event_publisher::EventPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Denied,
    TimedOut,
}

impl From<ApprovalStatus> for ApprovalOutcome {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Approved => ApprovalOutcome::Approved,
            ApprovalStatus::Denied => ApprovalOutcome::Denied,
            ApprovalStatus::Pending => unreachable!("pending is not a terminal outcome"),
        }
    }
}

pub struct ApprovalCoordinator {
    repository: Arc<dyn ApprovalRepository>,
    events: Arc<EventPublisher>,
    waiters: DashMap<ApprovalId, oneshot::Sender<ApprovalStatus>>,
    by_task: DashMap<TaskId, Vec<ApprovalId>>,
}

impl ApprovalCoordinator {
    pub fn new(repository: Arc<dyn ApprovalRepository>, events: Arc<EventPublisher>) -> Self {
        Self {
            repository,
            events,
            waiters: DashMap::new(),
            by_task: DashMap::new(),
        }
    }

    pub async fn create(
        &self,
        task_id: TaskId,
        workspace_id: WorkspaceId,
        call_id: CallId,
        tool_path: String,
        input: serde_json::Value,
    ) -> Result<Approval, RepositoryError> {
        let approval = self
            .repository
            .create(crate::domain::approval::NewApproval {
                task_id,
                workspace_id,
                tool_path: tool_path.clone(),
                input: input.clone(),
            })
            .await?;
        self.events
            .publish_approval(
                task_id,
                event_type::APPROVAL_REQUESTED,
                json!({
                    "approvalId": approval.id.to_string(),
                    "taskId": task_id.to_string(),
                    "callId": call_id.to_string(),
                    "toolPath": tool_path,
                    "input": input,
                    "createdAt": approval.created_at,
                }),
            )
            .await?;
        self.by_task.entry(task_id).or_default().push(approval.id);
        metrics::gauge!("agentkernel_pending_approvals").increment(1.0);
        Ok(approval)
    }

    /// Reads current status; if already terminal, returns immediately. If
    /// pending, registers a waiter and suspends until `resolve` or `cancel`.
    pub async fn r#await(&self, approval_id: ApprovalId, workspace_id: WorkspaceId) -> ApprovalOutcome {
        if let Ok(Some(approval)) = self.repository.get_in_workspace(approval_id, workspace_id).await {
            if approval.status.is_terminal() {
                return approval.status.into();
            }
        }

        let (tx, rx) = oneshot::channel();
        self.waiters.insert(approval_id, tx);
        match rx.await {
            Ok(status) => status.into(),
            Err(_) => ApprovalOutcome::TimedOut,
        }
    }

    /// `pending -> decision`. If the approval is not pending (already
    /// resolved, or unknown), returns `Ok(None)` without side effects.
    pub async fn resolve(
        &self,
        approval_id: ApprovalId,
        decision: ApprovalStatus,
        reviewer_id: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>, RepositoryError> {
        let resolved = self
            .repository
            .resolve(approval_id, decision, reviewer_id.clone(), reason.clone())
            .await?;

        if let Some(approval) = &resolved {
            self.events
                .publish_approval(
                    approval.task_id,
                    event_type::APPROVAL_RESOLVED,
                    json!({
                        "approvalId": approval.id.to_string(),
                        "taskId": approval.task_id.to_string(),
                        "toolPath": approval.tool_path,
                        "decision": decision.as_str(),
                        "reviewerId": reviewer_id,
                        "reason": reason,
                        "resolvedAt": approval.resolved_at,
                    }),
                )
                .await?;
            if let Some((_, tx)) = self.waiters.remove(&approval_id) {
                let _ = tx.send(decision);
            }
            metrics::gauge!("agentkernel_pending_approvals").decrement(1.0);
        }

        Ok(resolved)
    }

    /// Cancels a pending `Await` for `approval_id` without touching the
    /// Store row. Dropping the sender makes the parked `rx.await` resolve
    /// to `ApprovalOutcome::TimedOut`. Used by task timeout enforcement.
    pub fn cancel(&self, approval_id: ApprovalId) {
        self.waiters.remove(&approval_id);
    }

    /// Cancels every pending `Await` created for `task_id`. Called when a
    /// task's own timeout fires, so an approval left pending on a timed-out
    /// task doesn't keep a waiter parked forever.
    pub fn cancel_for_task(&self, task_id: TaskId) {
        if let Some((_, approval_ids)) = self.by_task.remove(&task_id) {
            for approval_id in approval_ids {
                self.cancel(approval_id);
            }
        }
    }

    /// Clears all in-memory waiters. Called once at boot.
    pub fn clear_waiters(&self) {
        self.waiters.clear();
        self.by_task.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::WorkspaceId;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::repositories::{InMemoryApprovalRepository, InMemoryTaskEventRepository};

    fn coordinator() -> Arc<ApprovalCoordinator> {
        let events = Arc::new(EventPublisher::new(
            Arc::new(InMemoryTaskEventRepository::new()),
            EventBus::new(),
        ));
        Arc::new(ApprovalCoordinator::new(
            Arc::new(InMemoryApprovalRepository::new()),
            events,
        ))
    }

    #[tokio::test]
    async fn await_observes_resolution_made_after_it_parked() {
        let coordinator = coordinator();
        let task_id = TaskId::new();
        let workspace_id = WorkspaceId::new();
        let approval = coordinator
            .create(task_id, workspace_id, CallId::new(), "fs.write".to_string(), serde_json::json!({}))
            .await
            .unwrap();

        let approval_id = approval.id;
        let waiter = coordinator.clone();
        let waiting = tokio::spawn(async move { waiter.r#await(approval_id, workspace_id).await });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        coordinator
            .resolve(approval_id, ApprovalStatus::Denied, None, None)
            .await
            .unwrap();

        let outcome = waiting.await.unwrap();
        assert_eq!(outcome, ApprovalOutcome::Denied);
    }

    #[tokio::test]
    async fn await_returns_immediately_when_already_resolved() {
        let coordinator = coordinator();
        let task_id = TaskId::new();
        let workspace_id = WorkspaceId::new();
        let approval = coordinator
            .create(task_id, workspace_id, CallId::new(), "fs.write".to_string(), serde_json::json!({}))
            .await
            .unwrap();

        coordinator
            .resolve(approval.id, ApprovalStatus::Approved, None, None)
            .await
            .unwrap();

        let outcome = coordinator.r#await(approval.id, workspace_id).await;
        assert_eq!(outcome, ApprovalOutcome::Approved);
    }

    #[tokio::test]
    async fn cancel_for_task_times_out_pending_waiter() {
        let coordinator = coordinator();
        let task_id = TaskId::new();
        let workspace_id = WorkspaceId::new();
        let approval = coordinator
            .create(task_id, workspace_id, CallId::new(), "fs.write".to_string(), serde_json::json!({}))
            .await
            .unwrap();

        let approval_id = approval.id;
        let waiter = coordinator.clone();
        let waiting = tokio::spawn(async move { waiter.r#await(approval_id, workspace_id).await });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        coordinator.cancel_for_task(task_id);

        let outcome = waiting.await.unwrap();
        assert_eq!(outcome, ApprovalOutcome::TimedOut);
    }
}
