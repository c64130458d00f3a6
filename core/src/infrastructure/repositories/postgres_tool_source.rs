// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::ids::WorkspaceId;
use crate::domain::repository::{RepositoryError, ToolSourceRepository};
use crate::domain::tool::{ToolSource, ToolSourceType, UpsertToolSource};

pub struct PostgresToolSourceRepository {
    pool: PgPool,
}

impl PostgresToolSourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn type_str(t: ToolSourceType) -> &'static str {
    match t {
        ToolSourceType::Mcp => "mcp",
        ToolSourceType::Openapi => "openapi",
        ToolSourceType::Graphql => "graphql",
    }
}

fn parse_type(s: &str) -> ToolSourceType {
    match s {
        "openapi" => ToolSourceType::Openapi,
        "graphql" => ToolSourceType::Graphql,
        _ => ToolSourceType::Mcp,
    }
}

fn row_to_source(row: sqlx::postgres::PgRow) -> ToolSource {
    let type_str: String = row.get("type");
    ToolSource {
        workspace_id: WorkspaceId(row.get("workspace_id")),
        name: row.get("name"),
        r#type: parse_type(&type_str),
        config: row.get("config"),
        enabled: row.get("enabled"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl ToolSourceRepository for PostgresToolSourceRepository {
    async fn upsert(&self, params: UpsertToolSource) -> Result<ToolSource, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO tool_sources (workspace_id, name, type, config, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            ON CONFLICT (workspace_id, name) DO UPDATE SET
                type = EXCLUDED.type,
                config = EXCLUDED.config,
                enabled = EXCLUDED.enabled,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(params.workspace_id.0)
        .bind(&params.name)
        .bind(type_str(params.r#type))
        .bind(&params.config)
        .bind(params.enabled)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_source(row))
    }

    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<ToolSource>, RepositoryError> {
        let rows = sqlx::query(r#"SELECT * FROM tool_sources WHERE workspace_id = $1"#)
            .bind(workspace_id.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(row_to_source).collect())
    }

    async fn delete(&self, workspace_id: WorkspaceId, name: &str) -> Result<(), RepositoryError> {
        sqlx::query(r#"DELETE FROM tool_sources WHERE workspace_id = $1 AND name = $2"#)
            .bind(workspace_id.0)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
