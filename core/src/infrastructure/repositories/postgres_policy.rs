// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::str::FromStr;

use crate::domain::ids::{ActorId, ClientId, WorkspaceId};
use crate::domain::policy::{AccessPolicy, ArgumentCondition, PolicyDecision, ScopeType};
use crate::domain::repository::{PolicyRepository, RepositoryError};

pub struct PostgresPolicyRepository {
    pool: PgPool,
}

impl PostgresPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_policy(row: sqlx::postgres::PgRow) -> Result<AccessPolicy, RepositoryError> {
    let decision_str: String = row.get("decision");
    let conditions_val: serde_json::Value = row.get("argument_conditions");
    let scope_type_str: Option<String> = row.get("scope_type");
    Ok(AccessPolicy {
        id: row.get("id"),
        workspace_id: WorkspaceId(row.get("workspace_id")),
        actor_id: row.get::<Option<String>, _>("actor_id").map(ActorId),
        client_id: row.get::<Option<String>, _>("client_id").map(ClientId),
        tool_path_pattern: row.get("tool_path_pattern"),
        decision: PolicyDecision::from_str(&decision_str).map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        priority: row.get("priority"),
        argument_conditions: serde_json::from_value::<Vec<ArgumentCondition>>(conditions_val)?,
        scope_type: scope_type_str.map(|s| match s.as_str() {
            "account" => ScopeType::Account,
            "organization" => ScopeType::Organization,
            _ => ScopeType::Workspace,
        }),
        target_account_id: row.get("target_account_id"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl PolicyRepository for PostgresPolicyRepository {
    async fn upsert(&self, mut policy: AccessPolicy) -> Result<AccessPolicy, RepositoryError> {
        if policy.id.is_nil() {
            policy.id = uuid::Uuid::new_v4();
        }
        let scope_type_str = policy.scope_type.map(|s| match s {
            ScopeType::Account => "account",
            ScopeType::Workspace => "workspace",
            ScopeType::Organization => "organization",
        });
        sqlx::query(
            r#"
            INSERT INTO access_policies (
                id, workspace_id, actor_id, client_id, tool_path_pattern, decision,
                priority, argument_conditions, scope_type, target_account_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                actor_id = EXCLUDED.actor_id,
                client_id = EXCLUDED.client_id,
                tool_path_pattern = EXCLUDED.tool_path_pattern,
                decision = EXCLUDED.decision,
                priority = EXCLUDED.priority,
                argument_conditions = EXCLUDED.argument_conditions,
                scope_type = EXCLUDED.scope_type,
                target_account_id = EXCLUDED.target_account_id
            "#,
        )
        .bind(policy.id)
        .bind(policy.workspace_id.0)
        .bind(policy.actor_id.as_ref().map(|a| a.0.clone()))
        .bind(policy.client_id.as_ref().map(|c| c.0.clone()))
        .bind(&policy.tool_path_pattern)
        .bind(policy.decision.as_str())
        .bind(policy.priority)
        .bind(serde_json::to_value(&policy.argument_conditions)?)
        .bind(scope_type_str)
        .bind(&policy.target_account_id)
        .bind(policy.created_at)
        .execute(&self.pool)
        .await?;
        Ok(policy)
    }

    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<AccessPolicy>, RepositoryError> {
        let rows = sqlx::query(r#"SELECT * FROM access_policies WHERE workspace_id = $1"#)
            .bind(workspace_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_policy).collect()
    }

    async fn delete(&self, id: uuid::Uuid, workspace_id: WorkspaceId) -> Result<(), RepositoryError> {
        sqlx::query(r#"DELETE FROM access_policies WHERE id = $1 AND workspace_id = $2"#)
            .bind(id)
            .bind(workspace_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
