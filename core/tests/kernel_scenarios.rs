// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end scenarios wired with in-memory repositories, mirroring the
//! concrete walkthroughs used to validate the kernel's lifecycle,
//! mediation, and remote-callback behavior.

use std::sync::Arc;
use std::time::Duration;

use agentkernel_core::application::approval_coordinator::ApprovalCoordinator;
use agentkernel_core::application::control_plane::{ControlPlane, CreateTaskParams};
use agentkernel_core::application::credential_resolver::CredentialResolver;
use agentkernel_core::application::event_publisher::EventPublisher;
use agentkernel_core::application::policy_engine::PolicyEngine;
use agentkernel_core::application::task_scheduler::TaskScheduler;
use agentkernel_core::application::tool_mediator::ToolMediator;
use agentkernel_core::application::tool_registry::ToolRegistry;
use agentkernel_core::domain::approval::ApprovalStatus;
use agentkernel_core::domain::ids::{ActorId, TaskId, WorkspaceId};
use agentkernel_core::domain::policy::{AccessPolicy, PolicyDecision};
use agentkernel_core::domain::repository::{
    AnonymousSessionRepository, ApprovalRepository, PolicyRepository, RepositoryError, TaskEventRepository,
    TaskRepository,
};
use agentkernel_core::domain::runtime::{Runtime, RuntimeAdapter, RuntimeError, RuntimeRunRequest, SandboxExecutionResult};
use agentkernel_core::domain::task::TaskStatus;
use agentkernel_core::domain::tool::{ApprovalMode, ToolDefinition, ToolError, ToolHandler, ToolRunContext};
use agentkernel_core::infrastructure::event_bus::EventBus;
use agentkernel_core::infrastructure::http;
use agentkernel_core::infrastructure::repositories::{
    InMemoryAnonymousSessionRepository, InMemoryApprovalRepository, InMemoryCredentialRepository,
    InMemoryPolicyRepository, InMemoryTaskEventRepository, InMemoryTaskRepository,
};
use agentkernel_core::infrastructure::runtime::{AdapterRegistry, RuntimeRegistry, ScriptRuntime, TaskRuntimeAdapter};
use async_trait::async_trait;
use serde_json::{json, Value};

struct DeleteDataHandler;

#[async_trait]
impl ToolHandler for DeleteDataHandler {
    async fn run(&self, input: Value, _ctx: &ToolRunContext) -> Result<Value, ToolError> {
        Ok(json!({ "deleted": true, "input": input }))
    }
}

struct AddHandler;

#[async_trait]
impl ToolHandler for AddHandler {
    async fn run(&self, input: Value, _ctx: &ToolRunContext) -> Result<Value, ToolError> {
        let a = input.get("a").and_then(Value::as_i64).unwrap_or(0);
        let b = input.get("b").and_then(Value::as_i64).unwrap_or(0);
        Ok(json!({ "sum": a + b }))
    }
}

/// Never resolves on its own; exists purely to exercise the scheduler's
/// timeout path without racing a real sleep duration against it.
struct NeverReturnsRuntime;

#[async_trait]
impl Runtime for NeverReturnsRuntime {
    async fn run(
        &self,
        _request: RuntimeRunRequest,
        _adapter: Arc<dyn RuntimeAdapter>,
    ) -> Result<SandboxExecutionResult, RuntimeError> {
        std::future::pending().await
    }
}

struct Harness {
    control_plane: Arc<ControlPlane>,
    tasks: Arc<dyn TaskRepository>,
    policies: Arc<InMemoryPolicyRepository>,
}

fn build_harness() -> Harness {
    let tasks: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskRepository::new());
    let approvals_repo: Arc<dyn ApprovalRepository> = Arc::new(InMemoryApprovalRepository::new());
    let task_events: Arc<dyn TaskEventRepository> = Arc::new(InMemoryTaskEventRepository::new());
    let anonymous_sessions: Arc<dyn AnonymousSessionRepository> = Arc::new(InMemoryAnonymousSessionRepository::new());
    let policies = Arc::new(InMemoryPolicyRepository::new());

    let event_bus = EventBus::new();
    let events = Arc::new(EventPublisher::new(task_events.clone(), event_bus.clone()));

    let registry = ToolRegistry::new();
    registry.register(ToolDefinition {
        path: "admin.delete_data".to_string(),
        description: "delete data".to_string(),
        approval: ApprovalMode::Required,
        source: None,
        metadata: None,
        credential_spec: None,
        handler: Arc::new(DeleteDataHandler),
    });
    registry.register(ToolDefinition {
        path: "math.add".to_string(),
        description: "add two numbers".to_string(),
        approval: ApprovalMode::Auto,
        source: None,
        metadata: None,
        credential_spec: None,
        handler: Arc::new(AddHandler),
    });

    let policy_engine = Arc::new(PolicyEngine::new(policies.clone() as Arc<dyn PolicyRepository>));
    let credential_resolver = Arc::new(CredentialResolver::new(Arc::new(InMemoryCredentialRepository::new())));
    let approval_coordinator = Arc::new(ApprovalCoordinator::new(approvals_repo.clone(), events.clone()));
    let mediator = Arc::new(ToolMediator::new(
        registry,
        policy_engine,
        credential_resolver,
        approval_coordinator.clone(),
        events.clone(),
    ));

    let runtimes = RuntimeRegistry::new();
    runtimes.register("inline", Arc::new(ScriptRuntime));
    runtimes.register("never", Arc::new(NeverReturnsRuntime));
    let adapters = AdapterRegistry::new();

    let scheduler = TaskScheduler::new(
        tasks.clone(),
        events.clone(),
        runtimes,
        adapters,
        mediator,
        approval_coordinator.clone(),
    );

    let control_plane = Arc::new(ControlPlane::new(
        tasks.clone(),
        approvals_repo,
        task_events,
        anonymous_sessions,
        event_bus,
        scheduler,
        approval_coordinator,
    ));

    Harness { control_plane, tasks, policies }
}

async fn wait_for_terminal(tasks: &Arc<dyn TaskRepository>, task_id: TaskId) -> agentkernel_core::domain::task::Task {
    for _ in 0..200 {
        if let Some(task) = tasks.get(task_id, None).await.unwrap() {
            if task.status.is_terminal() {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task never reached a terminal status");
}

#[tokio::test]
async fn scenario_1_gated_tool_approved() {
    let harness = build_harness();
    let workspace_id = WorkspaceId::new();

    let task = harness
        .control_plane
        .create_task(
            workspace_id,
            r#"admin.delete_data {"key":"abc"}"#.to_string(),
            CreateTaskParams {
                actor_id: Some(ActorId("actor_test".to_string())),
                runtime_id: Some("inline".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut approval_id = None;
    for _ in 0..200 {
        let pending = harness.control_plane.list_pending_approvals(workspace_id).await.unwrap();
        if let Some(approval) = pending.into_iter().find(|a| a.task_id == task.id) {
            approval_id = Some(approval.id);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let approval_id = approval_id.expect("expected exactly one pending approval on admin.delete_data");

    harness
        .control_plane
        .resolve_approval(workspace_id, approval_id, ApprovalStatus::Approved, Some("test-user".to_string()), None)
        .await
        .unwrap();

    let finished = wait_for_terminal(&harness.tasks, task.id).await;
    assert_eq!(finished.status, TaskStatus::Completed);

    let approved = harness.control_plane.list_pending_approvals(workspace_id).await.unwrap();
    assert!(approved.is_empty(), "the resolved approval must no longer be pending");
}

#[tokio::test]
async fn scenario_2_deny_by_policy() {
    let harness = build_harness();
    let workspace_id = WorkspaceId::new();

    harness
        .policies
        .upsert(AccessPolicy {
            id: uuid::Uuid::new_v4(),
            workspace_id,
            actor_id: None,
            client_id: None,
            tool_path_pattern: "admin.*".to_string(),
            decision: PolicyDecision::Deny,
            priority: 100,
            argument_conditions: Vec::new(),
            scope_type: None,
            target_account_id: None,
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let task = harness
        .control_plane
        .create_task(
            workspace_id,
            r#"admin.delete_data {"key":"abc"}"#.to_string(),
            CreateTaskParams { runtime_id: Some("inline".to_string()), ..Default::default() },
        )
        .await
        .unwrap();

    let finished = wait_for_terminal(&harness.tasks, task.id).await;
    assert_eq!(finished.status, TaskStatus::Denied);

    let pending = harness.control_plane.list_pending_approvals(workspace_id).await.unwrap();
    assert!(pending.is_empty(), "a deny decision must never create an approval row");
}

#[tokio::test]
async fn scenario_3_timeout() {
    let harness = build_harness();
    let workspace_id = WorkspaceId::new();

    let task = harness
        .control_plane
        .create_task(
            workspace_id,
            "noop".to_string(),
            CreateTaskParams {
                runtime_id: Some("never".to_string()),
                timeout_ms: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let finished = wait_for_terminal(&harness.tasks, task.id).await;
    assert_eq!(finished.status, TaskStatus::TimedOut);
    let started = finished.started_at.unwrap();
    let completed = finished.completed_at.unwrap();
    assert!((completed - started).num_milliseconds() >= 10);
}

#[tokio::test]
async fn scenario_6_resolve_unknown_approval() {
    let harness = build_harness();
    let workspace_id = WorkspaceId::new();

    let err = harness
        .control_plane
        .resolve_approval(
            workspace_id,
            agentkernel_core::domain::ids::ApprovalId::new(),
            ApprovalStatus::Approved,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

mod remote_callback {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const INTERNAL_TOKEN: &str = "kernel-internal-test-token";

    fn adapter_for(task_id: TaskId, workspace_id: WorkspaceId) -> axum::Router {
        let events = Arc::new(EventPublisher::new(Arc::new(InMemoryTaskEventRepository::new()), EventBus::new()));
        let registry = ToolRegistry::new();
        registry.register(ToolDefinition {
            path: "math.add".to_string(),
            description: "add two numbers".to_string(),
            approval: ApprovalMode::Auto,
            source: None,
            metadata: None,
            credential_spec: None,
            handler: Arc::new(AddHandler),
        });
        let policy_engine = Arc::new(PolicyEngine::new(Arc::new(InMemoryPolicyRepository::new()) as Arc<dyn PolicyRepository>));
        let credential_resolver = Arc::new(CredentialResolver::new(Arc::new(InMemoryCredentialRepository::new())));
        let approvals = Arc::new(ApprovalCoordinator::new(Arc::new(InMemoryApprovalRepository::new()), events.clone()));
        let mediator = Arc::new(ToolMediator::new(registry, policy_engine, credential_resolver, approvals, events.clone()));

        let task = agentkernel_core::domain::task::Task::new(
            task_id,
            agentkernel_core::domain::task::NewTask {
                workspace_id,
                actor_id: None,
                client_id: None,
                code: "noop".to_string(),
                runtime_id: "docker".to_string(),
                timeout_ms: 15_000,
                metadata: Default::default(),
            },
            chrono::Utc::now(),
        );
        let adapter = Arc::new(TaskRuntimeAdapter::new(task, mediator, events));
        let adapters = AdapterRegistry::new();
        adapters.register(task_id, adapter as Arc<dyn RuntimeAdapter>);

        http::router(adapters, INTERNAL_TOKEN.to_string())
    }

    #[tokio::test]
    async fn scenario_4_remote_tool_call_succeeds_with_the_internal_token() {
        let task_id = TaskId::new();
        let router = adapter_for(task_id, WorkspaceId::new());

        let body = json!({
            "run_id": task_id,
            "call_id": agentkernel_core::domain::ids::CallId::new(),
            "tool_path": "math.add",
            "input": { "a": 3, "b": 4 },
        });

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/internal/runs/{task_id}/tool-call"))
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {INTERNAL_TOKEN}"))
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["ok"], json!(true));
        assert_eq!(parsed["value"]["sum"], json!(7));

        let unauthenticated = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/internal/runs/{task_id}/tool-call"))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn scenario_5_run_mismatch_is_reported_without_a_transport_error() {
        let task_id = TaskId::new();
        let other_task_id = TaskId::new();
        let router = adapter_for(task_id, WorkspaceId::new());

        let call_id = agentkernel_core::domain::ids::CallId::new();
        let body = json!({
            "run_id": other_task_id,
            "call_id": call_id,
            "tool_path": "math.add",
            "input": { "a": 1, "b": 2 },
        });

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/internal/runs/{task_id}/tool-call"))
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {INTERNAL_TOKEN}"))
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["ok"], json!(false));
        let error = parsed["error"].as_str().unwrap();
        assert!(error.contains("Run mismatch"));
        assert!(error.contains(&call_id.to_string()));
    }
}
