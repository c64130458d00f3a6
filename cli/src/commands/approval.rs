// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Read-only approval inspection (see the note in `task.rs` about why
//! resolution isn't exposed here).

use anyhow::{Context, Result};
use uuid::Uuid;

use agentkernel_core::domain::ids::WorkspaceId;
use agentkernel_core::domain::repository::{create_approval_repository, PostgresConfig, StorageBackend};
use agentkernel_core::infrastructure::Database;

pub async fn list_pending(database_url: &str, workspace_id: Uuid) -> Result<()> {
    let database = Database::new(database_url).await.context("failed to connect to database")?;
    let backend = StorageBackend::PostgreSQL(PostgresConfig {
        connection_string: database_url.to_string(),
    });
    let repo = create_approval_repository(&backend, database.get_pool().clone());

    let approvals = repo
        .list_pending(WorkspaceId(workspace_id))
        .await
        .context("failed to list pending approvals")?;

    for approval in approvals {
        println!(
            "{}\t{}\t{}\t{}",
            approval.id,
            approval.task_id,
            approval.tool_path,
            approval.created_at.to_rfc3339(),
        );
    }
    Ok(())
}
