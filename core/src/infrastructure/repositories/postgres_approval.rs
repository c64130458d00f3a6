// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::str::FromStr;

use crate::domain::approval::{Approval, ApprovalStatus, NewApproval};
use crate::domain::ids::{ApprovalId, TaskId, WorkspaceId};
use crate::domain::repository::{ApprovalRepository, RepositoryError};

pub struct PostgresApprovalRepository {
    pool: PgPool,
}

impl PostgresApprovalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_approval(row: sqlx::postgres::PgRow) -> Result<Approval, RepositoryError> {
    let status_str: String = row.get("status");
    Ok(Approval {
        id: ApprovalId(row.get("id")),
        task_id: TaskId(row.get("task_id")),
        tool_path: row.get("tool_path"),
        input: row.get("input"),
        status: ApprovalStatus::from_str(&status_str).map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        reviewer_id: row.get("reviewer_id"),
        reason: row.get("reason"),
        created_at: row.get("created_at"),
        resolved_at: row.get("resolved_at"),
    })
}

#[async_trait]
impl ApprovalRepository for PostgresApprovalRepository {
    async fn create(&self, params: NewApproval) -> Result<Approval, RepositoryError> {
        let approval = Approval::new(ApprovalId::new(), params, chrono::Utc::now());
        sqlx::query(
            r#"
            INSERT INTO approvals (id, task_id, tool_path, input, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(approval.id.0)
        .bind(approval.task_id.0)
        .bind(&approval.tool_path)
        .bind(&approval.input)
        .bind(approval.status.as_str())
        .bind(approval.created_at)
        .execute(&self.pool)
        .await?;
        Ok(approval)
    }

    async fn resolve(
        &self,
        id: ApprovalId,
        decision: ApprovalStatus,
        reviewer_id: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE approvals
            SET status = $2, reviewer_id = $3, reason = $4, resolved_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id.0)
        .bind(decision.as_str())
        .bind(reviewer_id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_approval).transpose()
    }

    async fn list_pending(&self, workspace_id: WorkspaceId) -> Result<Vec<Approval>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT a.* FROM approvals a
            JOIN tasks t ON t.id = a.task_id
            WHERE t.workspace_id = $1 AND a.status = 'pending'
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(workspace_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_approval).collect()
    }

    async fn get_in_workspace(
        &self,
        id: ApprovalId,
        workspace_id: WorkspaceId,
    ) -> Result<Option<Approval>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT a.* FROM approvals a
            JOIN tasks t ON t.id = a.task_id
            WHERE a.id = $1 AND t.workspace_id = $2
            "#,
        )
        .bind(id.0)
        .bind(workspace_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_approval).transpose()
    }
}
