// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::ids::{ActorId, ClientId, TaskId, WorkspaceId};
use crate::domain::repository::{RepositoryError, TaskRepository};
use crate::domain::task::{NewTask, Task, TaskResult, TaskStatus};

pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_task(row: sqlx::postgres::PgRow) -> Result<Task, RepositoryError> {
    let status_str: String = row.get("status");
    let metadata_val: serde_json::Value = row.get("metadata");
    Ok(Task {
        id: TaskId(row.get("id")),
        workspace_id: WorkspaceId(row.get("workspace_id")),
        actor_id: row.get::<Option<String>, _>("actor_id").map(ActorId),
        client_id: row.get::<Option<String>, _>("client_id").map(ClientId),
        code: row.get("code"),
        runtime_id: row.get("runtime_id"),
        timeout_ms: row.get::<i64, _>("timeout_ms") as u64,
        metadata: serde_json::from_value::<HashMap<String, serde_json::Value>>(metadata_val)?,
        status: TaskStatus::from_str(&status_str).map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        stdout: row.get("stdout"),
        stderr: row.get("stderr"),
        exit_code: row.get("exit_code"),
        error: row.get("error"),
    })
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn create(&self, params: NewTask) -> Result<Task, RepositoryError> {
        let task = Task::new(TaskId::new(), params, chrono::Utc::now());
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, workspace_id, actor_id, client_id, code, runtime_id, timeout_ms,
                metadata, status, created_at, updated_at, stdout, stderr
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(task.id.0)
        .bind(task.workspace_id.0)
        .bind(task.actor_id.as_ref().map(|a| a.0.clone()))
        .bind(task.client_id.as_ref().map(|c| c.0.clone()))
        .bind(&task.code)
        .bind(&task.runtime_id)
        .bind(task.timeout_ms as i64)
        .bind(serde_json::to_value(&task.metadata)?)
        .bind(task.status.as_str())
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(&task.stdout)
        .bind(&task.stderr)
        .execute(&self.pool)
        .await?;
        Ok(task)
    }

    async fn get(&self, id: TaskId, workspace_id: Option<WorkspaceId>) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT * FROM tasks WHERE id = $1 AND ($2::uuid IS NULL OR workspace_id = $2)"#,
        )
        .bind(id.0)
        .bind(workspace_id.map(|w| w.0))
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_task).transpose()
    }

    async fn list(&self, workspace_id: WorkspaceId, limit: i64) -> Result<Vec<Task>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM tasks WHERE workspace_id = $1 ORDER BY created_at DESC LIMIT $2"#,
        )
        .bind(workspace_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_task).collect()
    }

    async fn mark_running(&self, id: TaskId) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'running', started_at = COALESCE(started_at, now()), updated_at = now()
            WHERE id = $1 AND status NOT IN ('completed', 'failed', 'timed_out', 'denied')
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_finished(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: TaskResult,
    ) -> Result<bool, RepositoryError> {
        let outcome = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, stdout = $3, stderr = $4, exit_code = $5, error = $6,
                completed_at = now(), updated_at = now()
            WHERE id = $1 AND status NOT IN ('completed', 'failed', 'timed_out', 'denied')
            "#,
        )
        .bind(id.0)
        .bind(status.as_str())
        .bind(&result.stdout)
        .bind(&result.stderr)
        .bind(result.exit_code)
        .bind(&result.error)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    async fn fail_all_running(&self, error: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'failed', error = $1, completed_at = now(), updated_at = now()
            WHERE status NOT IN ('completed', 'failed', 'timed_out', 'denied')
            "#,
        )
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
