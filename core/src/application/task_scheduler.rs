// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `CreateTask`'s dispatch loop (§4.8): create the row and publish the
//! `created`/`queued` pair synchronously, then hand the run itself to a
//! spawned task so the caller isn't blocked on a sandbox. `inFlightTaskIds`
//! guards against a task being dispatched twice; terminal-event publication
//! is gated on `mark_finished`'s `bool` so a task cannot emit two terminal
//! events no matter how it reaches this point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::event::event_type;
use crate::domain::ids::TaskId;
use crate::domain::repository::{RepositoryError, TaskRepository};
use crate::domain::runtime::{RuntimeAdapter, RuntimeRunRequest};
use crate::domain::task::{NewTask, Task, TaskResult, TaskStatus};

use super::approval_coordinator::ApprovalCoordinator;
use super::event_publisher::EventPublisher;
use super::tool_mediator::ToolMediator;
use crate::infrastructure::runtime::{AdapterRegistry, RuntimeRegistry, TaskRuntimeAdapter};

pub struct TaskScheduler {
    tasks: Arc<dyn TaskRepository>,
    events: Arc<EventPublisher>,
    runtimes: Arc<RuntimeRegistry>,
    adapters: Arc<AdapterRegistry>,
    mediator: Arc<ToolMediator>,
    approvals: Arc<ApprovalCoordinator>,
    in_flight: DashSet<TaskId>,
    shutting_down: AtomicBool,
}

impl TaskScheduler {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        events: Arc<EventPublisher>,
        runtimes: Arc<RuntimeRegistry>,
        adapters: Arc<AdapterRegistry>,
        mediator: Arc<ToolMediator>,
        approvals: Arc<ApprovalCoordinator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tasks,
            events,
            runtimes,
            adapters,
            mediator,
            approvals,
            in_flight: DashSet::new(),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Stops accepting new dispatches and marks every still-`running` task
    /// `failed`, mirroring the boot-time reconciliation sweep so a clean
    /// shutdown leaves no task stuck mid-flight.
    pub async fn shutdown(&self) -> Result<(), RepositoryError> {
        self.shutting_down.store(true, Ordering::SeqCst);
        let reconciled = self.tasks.fail_all_running("kernel shutting down").await?;
        if reconciled > 0 {
            warn!(count = reconciled, "marked running tasks failed at shutdown");
        }
        Ok(())
    }

    /// Creates the task row, publishes `task.created`/`task.queued`, and
    /// spawns the dispatch. Returns as soon as the row exists; the run
    /// itself happens off this call's stack.
    pub async fn create_task(self: &Arc<Self>, params: NewTask) -> Result<Task, RepositoryError> {
        let task = self.tasks.create(params).await?;

        self.events
            .publish_task(
                task.id,
                event_type::TASK_CREATED,
                json!({
                    "taskId": task.id.to_string(),
                    "status": TaskStatus::Queued.as_str(),
                    "runtimeId": task.runtime_id,
                    "timeoutMs": task.timeout_ms,
                    "createdAt": task.created_at,
                }),
            )
            .await?;
        self.events
            .publish_task(
                task.id,
                event_type::TASK_QUEUED,
                json!({
                    "taskId": task.id.to_string(),
                    "status": TaskStatus::Queued.as_str(),
                }),
            )
            .await?;

        let scheduler = self.clone();
        let task_id = task.id;
        tokio::spawn(async move {
            scheduler.dispatch(task_id).await;
        });

        Ok(task)
    }

    async fn dispatch(self: Arc<Self>, task_id: TaskId) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        if !self.in_flight.insert(task_id) {
            return;
        }

        if let Err(e) = self.run_dispatch(task_id).await {
            warn!(task_id = %task_id, error = %e, "task dispatch failed before reaching the runtime");
        }

        self.adapters.remove(task_id);
        self.in_flight.remove(&task_id);
    }

    async fn run_dispatch(&self, task_id: TaskId) -> Result<(), RepositoryError> {
        let Some(task) = self.tasks.get(task_id, None).await? else {
            warn!(task_id = %task_id, "dispatched task vanished from the store");
            return Ok(());
        };

        let Some(runtime) = self.runtimes.get(&task.runtime_id) else {
            return self
                .finalize(
                    task_id,
                    TaskStatus::Failed,
                    TaskResult {
                        error: Some("unknown_runtime".to_string()),
                        ..Default::default()
                    },
                )
                .await;
        };

        self.tasks.mark_running(task_id).await?;
        let started_task = self
            .tasks
            .get(task_id, None)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(task_id.to_string()))?;
        self.events
            .publish_task(
                task_id,
                event_type::TASK_RUNNING,
                json!({
                    "taskId": task_id.to_string(),
                    "status": TaskStatus::Running.as_str(),
                    "startedAt": started_task.started_at,
                }),
            )
            .await?;

        let adapter = Arc::new(TaskRuntimeAdapter::new(
            started_task.clone(),
            self.mediator.clone(),
            self.events.clone(),
        ));
        self.adapters.register(task_id, adapter.clone() as Arc<dyn RuntimeAdapter>);

        if task.timeout_ms == 0 {
            self.approvals.cancel_for_task(task_id);
            info!(task_id = %task_id, "timeout_ms is zero, terminating without dispatching to a runtime");
            return self
                .finalize(
                    task_id,
                    TaskStatus::TimedOut,
                    TaskResult {
                        error: Some("timed_out".to_string()),
                        ..Default::default()
                    },
                )
                .await;
        }

        let request = RuntimeRunRequest {
            task_id,
            code: task.code.clone(),
            timeout_ms: task.timeout_ms,
        };
        let run_future = runtime.run(request, adapter.clone() as Arc<dyn RuntimeAdapter>);

        let (status, result) = match tokio::time::timeout(Duration::from_millis(task.timeout_ms), run_future).await {
            Ok(Ok(execution)) => (
                execution.status,
                TaskResult {
                    stdout: execution.stdout,
                    stderr: execution.stderr,
                    exit_code: execution.exit_code,
                    error: execution.error,
                },
            ),
            Ok(Err(runtime_error)) => {
                let status = match runtime_error {
                    crate::domain::runtime::RuntimeError::Denied(_) => TaskStatus::Denied,
                    _ => TaskStatus::Failed,
                };
                (
                    status,
                    TaskResult {
                        stdout: adapter.stdout_snapshot(),
                        stderr: adapter.stderr_snapshot(),
                        exit_code: None,
                        error: Some(runtime_error.to_string()),
                    },
                )
            }
            Err(_elapsed) => {
                adapter.cancel();
                self.approvals.cancel_for_task(task_id);
                (
                    TaskStatus::TimedOut,
                    TaskResult {
                        stdout: adapter.stdout_snapshot(),
                        stderr: adapter.stderr_snapshot(),
                        exit_code: None,
                        error: Some("timed_out".to_string()),
                    },
                )
            }
        };

        self.finalize(task_id, status, result).await
    }

    async fn finalize(&self, task_id: TaskId, status: TaskStatus, result: TaskResult) -> Result<(), RepositoryError> {
        let performed = self.tasks.mark_finished(task_id, status, result).await?;
        if !performed {
            return Ok(());
        }

        let Some(task) = self.tasks.get(task_id, None).await? else {
            return Ok(());
        };

        let duration_ms = match (task.started_at, task.completed_at) {
            (Some(started), Some(completed)) => (completed - started).num_milliseconds().max(0) as u64,
            _ => 0,
        };

        let event_type = match status {
            TaskStatus::Completed => event_type::TASK_COMPLETED,
            TaskStatus::Failed => event_type::TASK_FAILED,
            TaskStatus::TimedOut => event_type::TASK_TIMED_OUT,
            TaskStatus::Denied => event_type::TASK_DENIED,
            TaskStatus::Queued | TaskStatus::Running => {
                unreachable!("finalize is only called with a terminal status")
            }
        };

        self.events
            .publish_task(
                task_id,
                event_type,
                json!({
                    "taskId": task_id.to_string(),
                    "status": status.as_str(),
                    "exitCode": task.exit_code,
                    "durationMs": duration_ms,
                    "error": task.error,
                    "completedAt": task.completed_at,
                }),
            )
            .await?;

        metrics::counter!("agentkernel_tasks_total", "status" => status.as_str()).increment(1);
        metrics::histogram!("agentkernel_task_duration_ms").record(duration_ms as f64);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::WorkspaceId;
    use crate::domain::runtime::{RuntimeError, SandboxExecutionResult};
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::repositories::{
        InMemoryApprovalRepository, InMemoryCredentialRepository, InMemoryPolicyRepository,
        InMemoryTaskEventRepository, InMemoryTaskRepository,
    };

    struct ImmediateRuntime {
        status: TaskStatus,
    }

    #[async_trait::async_trait]
    impl crate::domain::runtime::Runtime for ImmediateRuntime {
        async fn run(
            &self,
            _request: RuntimeRunRequest,
            _adapter: Arc<dyn RuntimeAdapter>,
        ) -> Result<SandboxExecutionResult, RuntimeError> {
            Ok(SandboxExecutionResult {
                status: self.status,
                stdout: "hi\n".to_string(),
                stderr: String::new(),
                exit_code: Some(0),
                error: None,
                duration_ms: 1,
            })
        }
    }

    struct NeverReturnsRuntime;

    #[async_trait::async_trait]
    impl crate::domain::runtime::Runtime for NeverReturnsRuntime {
        async fn run(
            &self,
            _request: RuntimeRunRequest,
            _adapter: Arc<dyn RuntimeAdapter>,
        ) -> Result<SandboxExecutionResult, RuntimeError> {
            std::future::pending().await
        }
    }

    fn scheduler_with_runtime(runtime: Arc<dyn crate::domain::runtime::Runtime>) -> Arc<TaskScheduler> {
        let tasks: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskRepository::new());
        let events = Arc::new(EventPublisher::new(Arc::new(InMemoryTaskEventRepository::new()), EventBus::new()));
        let runtimes = RuntimeRegistry::new();
        runtimes.register("inline", runtime);
        let adapters = AdapterRegistry::new();
        let approvals = Arc::new(ApprovalCoordinator::new(Arc::new(InMemoryApprovalRepository::new()), events.clone()));
        let policy_engine = Arc::new(super::super::policy_engine::PolicyEngine::new(Arc::new(InMemoryPolicyRepository::new())));
        let credential_resolver = Arc::new(super::super::credential_resolver::CredentialResolver::new(Arc::new(
            InMemoryCredentialRepository::new(),
        )));
        let registry = super::super::tool_registry::ToolRegistry::new();
        let mediator = Arc::new(ToolMediator::new(
            registry,
            policy_engine,
            credential_resolver,
            approvals.clone(),
            events.clone(),
        ));
        TaskScheduler::new(tasks, events, runtimes, adapters, mediator, approvals)
    }

    fn new_task_params() -> NewTask {
        NewTask {
            workspace_id: WorkspaceId::new(),
            actor_id: None,
            client_id: None,
            code: "print('hi')".to_string(),
            runtime_id: "inline".to_string(),
            timeout_ms: 5_000,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn completed_task_reaches_terminal_status() {
        let scheduler = scheduler_with_runtime(Arc::new(ImmediateRuntime {
            status: TaskStatus::Completed,
        }));
        let task = scheduler.create_task(new_task_params()).await.unwrap();

        for _ in 0..50 {
            if let Some(found) = scheduler.tasks.get(task.id, None).await.unwrap() {
                if found.status.is_terminal() {
                    assert_eq!(found.status, TaskStatus::Completed);
                    assert_eq!(found.stdout, "hi\n");
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task never reached a terminal status");
    }

    #[tokio::test]
    async fn unknown_runtime_fails_immediately() {
        let scheduler = scheduler_with_runtime(Arc::new(ImmediateRuntime {
            status: TaskStatus::Completed,
        }));
        let mut params = new_task_params();
        params.runtime_id = "does-not-exist".to_string();
        let task = scheduler.create_task(params).await.unwrap();

        for _ in 0..50 {
            if let Some(found) = scheduler.tasks.get(task.id, None).await.unwrap() {
                if found.status.is_terminal() {
                    assert_eq!(found.status, TaskStatus::Failed);
                    assert_eq!(found.error.as_deref(), Some("unknown_runtime"));
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task never reached a terminal status");
    }

    #[tokio::test]
    async fn zero_timeout_times_out_without_running() {
        let scheduler = scheduler_with_runtime(Arc::new(NeverReturnsRuntime));
        let mut params = new_task_params();
        params.timeout_ms = 0;
        let task = scheduler.create_task(params).await.unwrap();

        for _ in 0..50 {
            if let Some(found) = scheduler.tasks.get(task.id, None).await.unwrap() {
                if found.status.is_terminal() {
                    assert_eq!(found.status, TaskStatus::TimedOut);
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task never reached a terminal status");
    }

    #[tokio::test]
    async fn slow_runtime_is_timed_out_by_the_scheduler() {
        let scheduler = scheduler_with_runtime(Arc::new(NeverReturnsRuntime));
        let mut params = new_task_params();
        params.timeout_ms = 30;
        let task = scheduler.create_task(params).await.unwrap();

        for _ in 0..50 {
            if let Some(found) = scheduler.tasks.get(task.id, None).await.unwrap() {
                if found.status.is_terminal() {
                    assert_eq!(found.status, TaskStatus::TimedOut);
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("task never reached a terminal status");
    }
}
