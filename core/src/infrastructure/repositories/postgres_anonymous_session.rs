// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::anonymous_session::AnonymousSession;
use crate::domain::ids::{ActorId, ClientId, WorkspaceId};
use crate::domain::repository::{AnonymousSessionRepository, RepositoryError};

pub struct PostgresAnonymousSessionRepository {
    pool: PgPool,
}

impl PostgresAnonymousSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_session(row: sqlx::postgres::PgRow) -> AnonymousSession {
    AnonymousSession {
        session_id: row.get("session_id"),
        workspace_id: WorkspaceId(row.get("workspace_id")),
        actor_id: ActorId(row.get("actor_id")),
        client_id: ClientId(row.get("client_id")),
        created_at: row.get("created_at"),
        last_seen_at: row.get("last_seen_at"),
    }
}

#[async_trait]
impl AnonymousSessionRepository for PostgresAnonymousSessionRepository {
    async fn bootstrap(&self, session_id: Option<String>) -> Result<AnonymousSession, RepositoryError> {
        let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let fresh = AnonymousSession::new(session_id.clone(), chrono::Utc::now());
        let row = sqlx::query(
            r#"
            INSERT INTO anonymous_sessions (session_id, workspace_id, actor_id, client_id, created_at, last_seen_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (session_id) DO UPDATE SET last_seen_at = now()
            RETURNING *
            "#,
        )
        .bind(&session_id)
        .bind(fresh.workspace_id.0)
        .bind(&fresh.actor_id.0)
        .bind(&fresh.client_id.0)
        .bind(fresh.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_session(row))
    }
}
