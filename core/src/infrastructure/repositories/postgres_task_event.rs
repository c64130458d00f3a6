// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::event::{EventName, NewTaskEvent, TaskEvent};
use crate::domain::ids::TaskId;
use crate::domain::repository::{RepositoryError, TaskEventRepository};

pub struct PostgresTaskEventRepository {
    pool: PgPool,
}

impl PostgresTaskEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_event(row: sqlx::postgres::PgRow) -> TaskEvent {
    let event_name_str: String = row.get("event_name");
    TaskEvent {
        id: row.get("id"),
        task_id: TaskId(row.get("task_id")),
        event_name: match event_name_str.as_str() {
            "approval" => EventName::Approval,
            _ => EventName::Task,
        },
        r#type: row.get("type"),
        payload: row.get("payload"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl TaskEventRepository for PostgresTaskEventRepository {
    async fn append(&self, event: NewTaskEvent) -> Result<TaskEvent, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO task_events (task_id, event_name, type, payload, created_at)
            VALUES ($1, $2, $3, $4, now())
            RETURNING *
            "#,
        )
        .bind(event.task_id.0)
        .bind(event.event_name.as_str())
        .bind(&event.r#type)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_event(row))
    }

    async fn list(&self, task_id: TaskId) -> Result<Vec<TaskEvent>, RepositoryError> {
        let rows = sqlx::query(r#"SELECT * FROM task_events WHERE task_id = $1 ORDER BY id ASC"#)
            .bind(task_id.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(row_to_event).collect())
    }
}
