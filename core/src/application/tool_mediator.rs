// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `InvokeTool` entry point (§4.7). Safe to call concurrently for distinct
//! `(task, callId)` pairs; a tool handler that calls other tools re-enters
//! this same mediator with the task it was given.

use std::sync::Arc;

use serde_json::json;

use crate::domain::credential::ResolvedToolCredential;
use crate::domain::event::event_type;
use crate::domain::ids::TaskId;
use crate::domain::policy::PolicyDecision;
use crate::domain::task::Task;
use crate::domain::tool::{ApprovalMode, ToolError, ToolRunContext};

use super::approval_coordinator::{ApprovalCoordinator, ApprovalOutcome};
use super::credential_resolver::CredentialResolver;
use super::event_publisher::EventPublisher;
use super::policy_engine::PolicyEngine;
use super::tool_registry::ToolRegistry;
use crate::domain::runtime::{ToolCallRequest, ToolCallResult};

pub struct ToolMediator {
    registry: Arc<ToolRegistry>,
    policy_engine: Arc<PolicyEngine>,
    credential_resolver: Arc<CredentialResolver>,
    approvals: Arc<ApprovalCoordinator>,
    events: Arc<EventPublisher>,
}

impl ToolMediator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy_engine: Arc<PolicyEngine>,
        credential_resolver: Arc<CredentialResolver>,
        approvals: Arc<ApprovalCoordinator>,
        events: Arc<EventPublisher>,
    ) -> Self {
        Self {
            registry,
            policy_engine,
            credential_resolver,
            approvals,
            events,
        }
    }

    pub async fn invoke_tool(&self, task: &Task, call: ToolCallRequest) -> ToolCallResult {
        let call_id = call.call_id.to_string();
        let tool = match self.registry.get(&call.tool_path) {
            Some(tool) => tool,
            None => return ToolCallResult::err(format!("unknown_tool: {}", call.tool_path)),
        };

        if let Err(e) = self
            .events
            .publish_task(
                task.id,
                event_type::TOOL_CALL_STARTED,
                json!({
                    "taskId": task.id.to_string(),
                    "callId": call_id,
                    "toolPath": call.tool_path,
                    "approval": approval_str(tool.approval),
                    "input": call.input,
                }),
            )
            .await
        {
            return ToolCallResult::err(e.to_string());
        }

        let default_decision = match tool.approval {
            ApprovalMode::Auto => PolicyDecision::Allow,
            ApprovalMode::Required => PolicyDecision::RequireApproval,
        };

        let decision = match self
            .policy_engine
            .evaluate(
                task.workspace_id,
                task.actor_id.as_ref(),
                task.client_id.as_ref(),
                &call.tool_path,
                &call.input,
                default_decision,
            )
            .await
        {
            // A policy can tighten a tool's own approval mode but never
            // loosen it: a tool declared `approval: required` stays at
            // least `require_approval` even if a policy says `allow`.
            Ok(decision) => decision.stricter(default_decision),
            Err(e) => return ToolCallResult::err(e.to_string()),
        };

        let mut approval_id_for_denial: Option<String> = None;

        metrics::counter!("agentkernel_tool_calls_total", "decision" => decision.as_str()).increment(1);

        match decision {
            PolicyDecision::Deny => {
                return self.deny(task.id, &call_id, &call.tool_path, None).await;
            }
            PolicyDecision::RequireApproval => {
                let approval = match self
                    .approvals
                    .create(task.id, task.workspace_id, call.call_id, call.tool_path.clone(), call.input.clone())
                    .await
                {
                    Ok(approval) => approval,
                    Err(e) => return ToolCallResult::err(e.to_string()),
                };
                approval_id_for_denial = Some(approval.id.to_string());

                match self.approvals.r#await(approval.id, task.workspace_id).await {
                    ApprovalOutcome::Approved => {}
                    ApprovalOutcome::Denied => {
                        return self.deny(task.id, &call_id, &call.tool_path, approval_id_for_denial).await;
                    }
                    ApprovalOutcome::TimedOut => {
                        let _ = self
                            .events
                            .publish_task(
                                task.id,
                                event_type::TOOL_CALL_FAILED,
                                json!({
                                    "taskId": task.id.to_string(),
                                    "callId": call_id,
                                    "toolPath": call.tool_path,
                                    "error": "timed_out",
                                }),
                            )
                            .await;
                        return ToolCallResult::err("timed_out");
                    }
                }
            }
            PolicyDecision::Allow => {}
        }

        let credential: Option<ResolvedToolCredential> = match &tool.credential_spec {
            Some(spec) => {
                match self
                    .credential_resolver
                    .resolve(task.workspace_id, task.actor_id.as_ref(), spec)
                    .await
                {
                    Ok(credential) => credential,
                    Err(e) => return ToolCallResult::err(e.to_string()),
                }
            }
            None => None,
        };

        let is_tool_allowed = self.is_tool_allowed_closure(task);
        let ctx = ToolRunContext {
            task_id: task.id,
            workspace_id: task.workspace_id,
            actor_id: task.actor_id.clone(),
            client_id: task.client_id.clone(),
            credential,
            is_tool_allowed,
        };

        match tool.handler.run(call.input.clone(), &ctx).await {
            Ok(value) => {
                let _ = self
                    .events
                    .publish_task(
                        task.id,
                        event_type::TOOL_CALL_COMPLETED,
                        json!({
                            "taskId": task.id.to_string(),
                            "callId": call_id,
                            "toolPath": call.tool_path,
                            "output": value,
                        }),
                    )
                    .await;
                ToolCallResult::ok(value)
            }
            Err(ToolError::Failed(message)) => {
                let _ = self
                    .events
                    .publish_task(
                        task.id,
                        event_type::TOOL_CALL_FAILED,
                        json!({
                            "taskId": task.id.to_string(),
                            "callId": call_id,
                            "toolPath": call.tool_path,
                            "error": message,
                        }),
                    )
                    .await;
                ToolCallResult::err(message)
            }
        }
    }

    async fn deny(
        &self,
        task_id: TaskId,
        call_id: &str,
        tool_path: &str,
        approval_id: Option<String>,
    ) -> ToolCallResult {
        let mut payload = json!({
            "taskId": task_id.to_string(),
            "callId": call_id,
            "toolPath": tool_path,
        });
        if let Some(approval_id) = &approval_id {
            payload["approvalId"] = json!(approval_id);
        }
        let _ = self.events.publish_task(task_id, event_type::TOOL_CALL_DENIED, payload).await;
        ToolCallResult::denied(format!("denied: {tool_path} was denied"))
    }

    fn is_tool_allowed_closure(&self, task: &Task) -> Arc<dyn Fn(&str) -> bool + Send + Sync> {
        let registry = self.registry.clone();
        let policy_engine = self.policy_engine.clone();
        let workspace_id = task.workspace_id;
        let actor_id = task.actor_id.clone();
        let client_id = task.client_id.clone();
        Arc::new(move |path: &str| {
            let default = match registry.get(path) {
                Some(def) => match def.approval {
                    ApprovalMode::Auto => PolicyDecision::Allow,
                    ApprovalMode::Required => PolicyDecision::RequireApproval,
                },
                None => return false,
            };
            let decision = policy_engine
                .evaluate_cached(
                    workspace_id,
                    actor_id.as_ref(),
                    client_id.as_ref(),
                    path,
                    &serde_json::json!({}),
                    default,
                )
                .stricter(default);
            decision != PolicyDecision::Deny
        })
    }
}

fn approval_str(mode: ApprovalMode) -> &'static str {
    match mode {
        ApprovalMode::Auto => "auto",
        ApprovalMode::Required => "required",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::WorkspaceId;
    use crate::domain::policy::{AccessPolicy, PolicyDecision};
    use crate::domain::repository::PolicyRepository;
    use crate::domain::task::NewTask;
    use crate::domain::tool::{ToolDefinition, ToolHandler, ToolRunContext};
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::repositories::{
        InMemoryApprovalRepository, InMemoryCredentialRepository, InMemoryPolicyRepository,
        InMemoryTaskEventRepository,
    };
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn run(&self, input: Value, _ctx: &ToolRunContext) -> Result<Value, ToolError> {
            Ok(input)
        }
    }

    fn mediator(policy_repository: Arc<InMemoryPolicyRepository>) -> ToolMediator {
        let events = Arc::new(EventPublisher::new(
            Arc::new(InMemoryTaskEventRepository::new()),
            EventBus::new(),
        ));
        let registry = ToolRegistry::new();
        registry.register(ToolDefinition {
            path: "admin.delete".to_string(),
            description: "delete something".to_string(),
            approval: ApprovalMode::Required,
            source: None,
            metadata: None,
            credential_spec: None,
            handler: Arc::new(EchoHandler),
        });
        let policy_engine = Arc::new(PolicyEngine::new(policy_repository));
        let credential_resolver = Arc::new(CredentialResolver::new(Arc::new(InMemoryCredentialRepository::new())));
        let approvals = Arc::new(ApprovalCoordinator::new(Arc::new(InMemoryApprovalRepository::new()), events.clone()));
        ToolMediator::new(registry, policy_engine, credential_resolver, approvals, events)
    }

    fn task(workspace_id: WorkspaceId) -> Task {
        Task::new(
            TaskId::new(),
            NewTask {
                workspace_id,
                actor_id: None,
                client_id: None,
                code: "noop".into(),
                runtime_id: "inline".into(),
                timeout_ms: 15_000,
                metadata: HashMap::new(),
            },
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn policy_allow_cannot_loosen_a_tool_declared_required() {
        let policy_repository = Arc::new(InMemoryPolicyRepository::new());
        let workspace_id = WorkspaceId::new();
        policy_repository
            .upsert(AccessPolicy {
                id: uuid::Uuid::new_v4(),
                workspace_id,
                actor_id: None,
                client_id: None,
                tool_path_pattern: "admin.delete".to_string(),
                decision: PolicyDecision::Allow,
                priority: 10,
                argument_conditions: Vec::new(),
                scope_type: None,
                target_account_id: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let mediator = mediator(policy_repository);
        let task = task(workspace_id);
        let call = ToolCallRequest {
            run_id: task.id,
            call_id: crate::domain::ids::CallId::new(),
            tool_path: "admin.delete".to_string(),
            input: serde_json::json!({}),
        };

        let waiting =
            tokio::time::timeout(std::time::Duration::from_millis(50), mediator.invoke_tool(&task, call)).await;

        // A require_approval call with nobody to resolve it times out rather
        // than quietly running, proving the policy's `allow` was overridden.
        assert!(waiting.is_err() || matches!(waiting.unwrap(), ToolCallResult::Err { .. }));
    }
}
