// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::credential::{Credential, CredentialProvider, CredentialScope, UpsertCredential};
use crate::domain::ids::{ActorId, WorkspaceId};
use crate::domain::repository::{CredentialRepository, RepositoryError};

pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn scope_str(scope: CredentialScope) -> &'static str {
    match scope {
        CredentialScope::Workspace => "workspace",
        CredentialScope::Actor => "actor",
    }
}

fn parse_scope(s: &str) -> CredentialScope {
    match s {
        "actor" => CredentialScope::Actor,
        _ => CredentialScope::Workspace,
    }
}

fn provider_str(provider: CredentialProvider) -> &'static str {
    match provider {
        CredentialProvider::Local => "local",
        CredentialProvider::Vault => "vault",
    }
}

fn parse_provider(s: &str) -> CredentialProvider {
    match s {
        "vault" => CredentialProvider::Vault,
        _ => CredentialProvider::Local,
    }
}

fn row_to_credential(row: sqlx::postgres::PgRow) -> Credential {
    let scope_str: String = row.get("scope");
    let provider_str: String = row.get("provider");
    Credential {
        workspace_id: WorkspaceId(row.get("workspace_id")),
        source_key: row.get("source_key"),
        scope: parse_scope(&scope_str),
        actor_id: row.get::<Option<String>, _>("actor_id").map(ActorId),
        secret_json: row.get("secret_json"),
        provider: parse_provider(&provider_str),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn upsert(&self, params: UpsertCredential) -> Result<Credential, RepositoryError> {
        let actor_key = params.actor_id.as_ref().map(|a| a.0.clone()).unwrap_or_default();
        let row = sqlx::query(
            r#"
            INSERT INTO source_credentials (
                workspace_id, source_key, scope, actor_id, actor_key, secret_json, provider,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
            ON CONFLICT (workspace_id, source_key, scope, actor_key) DO UPDATE SET
                secret_json = EXCLUDED.secret_json,
                provider = EXCLUDED.provider,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(params.workspace_id.0)
        .bind(&params.source_key)
        .bind(scope_str(params.scope))
        .bind(params.actor_id.as_ref().map(|a| a.0.clone()))
        .bind(actor_key)
        .bind(&params.secret_json)
        .bind(provider_str(params.provider))
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_credential(row))
    }

    async fn resolve(
        &self,
        workspace_id: WorkspaceId,
        source_key: &str,
        scope: CredentialScope,
        actor_id: Option<ActorId>,
    ) -> Result<Option<Credential>, RepositoryError> {
        let actor_key = actor_id.as_ref().map(|a| a.0.clone()).unwrap_or_default();
        let row = sqlx::query(
            r#"
            SELECT * FROM source_credentials
            WHERE workspace_id = $1 AND source_key = $2 AND scope = $3 AND actor_key = $4
            "#,
        )
        .bind(workspace_id.0)
        .bind(source_key)
        .bind(scope_str(scope))
        .bind(actor_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_credential))
    }

    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<Credential>, RepositoryError> {
        let rows = sqlx::query(r#"SELECT * FROM source_credentials WHERE workspace_id = $1"#)
            .bind(workspace_id.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(row_to_credential).collect())
    }
}
