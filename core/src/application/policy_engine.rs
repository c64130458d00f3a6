// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stateless evaluator over a per-workspace cache of compiled policies
//! (Design Notes §9: "policy pattern matching"). The cache is invalidated
//! wholesale on any upsert/delete for the affected workspace and rebuilt
//! lazily on the next evaluation, which keeps the read path lock-cheap.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::domain::ids::{ActorId, ClientId, WorkspaceId};
use crate::domain::policy::{AccessPolicy, PathMatcher, PolicyDecision};
use crate::domain::repository::{PolicyRepository, RepositoryError};

struct CompiledPolicy {
    policy: AccessPolicy,
    matcher: PathMatcher,
}

pub struct PolicyEngine {
    repository: Arc<dyn PolicyRepository>,
    cache: DashMap<WorkspaceId, Arc<Vec<CompiledPolicy>>>,
}

impl PolicyEngine {
    pub fn new(repository: Arc<dyn PolicyRepository>) -> Self {
        Self {
            repository,
            cache: DashMap::new(),
        }
    }

    /// Must be called after any upsert/delete affecting `workspace_id`.
    pub fn invalidate(&self, workspace_id: WorkspaceId) {
        self.cache.remove(&workspace_id);
    }

    pub async fn evaluate(
        &self,
        workspace_id: WorkspaceId,
        actor_id: Option<&ActorId>,
        client_id: Option<&ClientId>,
        tool_path: &str,
        input: &Value,
        default_decision: PolicyDecision,
    ) -> Result<PolicyDecision, RepositoryError> {
        let compiled = self.load(workspace_id).await?;
        Ok(select(&compiled, workspace_id, actor_id, client_id, tool_path, input, default_decision))
    }

    /// Same algorithm as `evaluate`, but only consults whatever is already
    /// cached for the workspace, never touching the Store. Used by
    /// `isToolAllowed` closures, which must be synchronous. Falls back to
    /// `default_decision` (treated as "unknown, assume not denied yet") if
    /// nothing has been cached for the workspace.
    pub fn evaluate_cached(
        &self,
        workspace_id: WorkspaceId,
        actor_id: Option<&ActorId>,
        client_id: Option<&ClientId>,
        tool_path: &str,
        input: &Value,
        default_decision: PolicyDecision,
    ) -> PolicyDecision {
        match self.cache.get(&workspace_id) {
            Some(compiled) => select(&compiled, workspace_id, actor_id, client_id, tool_path, input, default_decision),
            None => default_decision,
        }
    }

    async fn load(&self, workspace_id: WorkspaceId) -> Result<Arc<Vec<CompiledPolicy>>, RepositoryError> {
        if let Some(cached) = self.cache.get(&workspace_id) {
            return Ok(cached.clone());
        }
        let policies = self.repository.list(workspace_id).await?;
        let compiled: Vec<CompiledPolicy> = policies
            .into_iter()
            .filter_map(|policy| {
                PathMatcher::compile(&policy.tool_path_pattern)
                    .ok()
                    .map(|matcher| CompiledPolicy { policy, matcher })
            })
            .collect();
        let compiled = Arc::new(compiled);
        self.cache.insert(workspace_id, compiled.clone());
        Ok(compiled)
    }
}

fn select(
    compiled: &[CompiledPolicy],
    workspace_id: WorkspaceId,
    actor_id: Option<&ActorId>,
    client_id: Option<&ClientId>,
    tool_path: &str,
    input: &Value,
    default_decision: PolicyDecision,
) -> PolicyDecision {
    let mut candidates: Vec<&CompiledPolicy> = compiled
        .iter()
        .filter(|c| {
            if c.policy.workspace_id != workspace_id {
                return false;
            }
            if let Some(required_actor) = &c.policy.actor_id {
                if Some(required_actor) != actor_id {
                    return false;
                }
            }
            if let Some(required_client) = &c.policy.client_id {
                if Some(required_client) != client_id {
                    return false;
                }
            }
            if !c.matcher.matches(tool_path) {
                return false;
            }
            c.policy.argument_conditions.iter().all(|cond| cond.matches(input))
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.policy
            .priority
            .cmp(&a.policy.priority)
            .then_with(|| a.policy.created_at.cmp(&b.policy.created_at))
    });

    candidates.first().map(|c| c.policy.decision).unwrap_or(default_decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::ArgumentCondition;
    use crate::infrastructure::repositories::InMemoryPolicyRepository;
    use chrono::Utc;

    fn policy(pattern: &str, decision: PolicyDecision, priority: i32) -> AccessPolicy {
        AccessPolicy {
            id: uuid::Uuid::new_v4(),
            workspace_id: WorkspaceId::new(),
            actor_id: None,
            client_id: None,
            tool_path_pattern: pattern.to_string(),
            decision,
            priority,
            argument_conditions: Vec::new(),
            scope_type: None,
            target_account_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn higher_priority_policy_wins() {
        let repo: Arc<dyn PolicyRepository> = Arc::new(InMemoryPolicyRepository::new());
        let workspace_id = WorkspaceId::new();

        let mut low = policy("admin.*", PolicyDecision::Allow, 1);
        low.workspace_id = workspace_id;
        let mut high = policy("admin.delete_data", PolicyDecision::Deny, 100);
        high.workspace_id = workspace_id;
        repo.upsert(low).await.unwrap();
        repo.upsert(high).await.unwrap();

        let engine = PolicyEngine::new(repo);
        let decision = engine
            .evaluate(
                workspace_id,
                None,
                None,
                "admin.delete_data",
                &serde_json::json!({}),
                PolicyDecision::Allow,
            )
            .await
            .unwrap();
        assert_eq!(decision, PolicyDecision::Deny);
    }

    #[tokio::test]
    async fn no_match_falls_back_to_default() {
        let repo: Arc<dyn PolicyRepository> = Arc::new(InMemoryPolicyRepository::new());
        let engine = PolicyEngine::new(repo);
        let decision = engine
            .evaluate(
                WorkspaceId::new(),
                None,
                None,
                "math.add",
                &serde_json::json!({}),
                PolicyDecision::RequireApproval,
            )
            .await
            .unwrap();
        assert_eq!(decision, PolicyDecision::RequireApproval);
    }

    #[tokio::test]
    async fn argument_condition_narrows_match() {
        let repo: Arc<dyn PolicyRepository> = Arc::new(InMemoryPolicyRepository::new());
        let workspace_id = WorkspaceId::new();
        let mut p = policy("fs.write", PolicyDecision::Deny, 10);
        p.workspace_id = workspace_id;
        p.argument_conditions = vec![ArgumentCondition {
            key: "path".into(),
            operator: crate::domain::policy::ConditionOperator::StartsWith,
            value: serde_json::Value::String("/etc".into()),
        }];
        repo.upsert(p).await.unwrap();

        let engine = PolicyEngine::new(repo);
        let denied = engine
            .evaluate(
                workspace_id,
                None,
                None,
                "fs.write",
                &serde_json::json!({"path": "/etc/passwd"}),
                PolicyDecision::Allow,
            )
            .await
            .unwrap();
        assert_eq!(denied, PolicyDecision::Deny);

        let allowed = engine
            .evaluate(
                workspace_id,
                None,
                None,
                "fs.write",
                &serde_json::json!({"path": "/tmp/out"}),
                PolicyDecision::Allow,
            )
            .await
            .unwrap();
        assert_eq!(allowed, PolicyDecision::Allow);
    }
}
