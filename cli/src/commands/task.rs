// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Read-only task inspection. Resolving an approval or dispatching a task
//! requires coordinating with the running kernel process (the in-memory
//! approval waiter, the scheduler's dispatch loop) and has no transport in
//! scope, so these commands only ever read rows back out of the Store.

use anyhow::{Context, Result};
use uuid::Uuid;

use agentkernel_core::domain::ids::{TaskId, WorkspaceId};
use agentkernel_core::domain::repository::{create_task_repository, PostgresConfig, StorageBackend};
use agentkernel_core::infrastructure::Database;

pub async fn list(database_url: &str, workspace_id: Uuid, limit: i64) -> Result<()> {
    let repo = connect(database_url).await?;
    let tasks = repo
        .list(WorkspaceId(workspace_id), limit)
        .await
        .context("failed to list tasks")?;

    for task in tasks {
        println!(
            "{}\t{}\t{}\t{}",
            task.id,
            task.status.as_str(),
            task.runtime_id,
            task.created_at.to_rfc3339(),
        );
    }
    Ok(())
}

pub async fn get(database_url: &str, task_id: Uuid, workspace_id: Uuid) -> Result<()> {
    let repo = connect(database_url).await?;
    let task = repo
        .get(TaskId(task_id), Some(WorkspaceId(workspace_id)))
        .await
        .context("failed to fetch task")?
        .ok_or_else(|| anyhow::anyhow!("task {task_id} not found in workspace {workspace_id}"))?;

    println!("id:           {}", task.id);
    println!("status:       {}", task.status.as_str());
    println!("runtime:      {}", task.runtime_id);
    println!("timeout_ms:   {}", task.timeout_ms);
    println!("created_at:   {}", task.created_at.to_rfc3339());
    if let Some(started_at) = task.started_at {
        println!("started_at:   {}", started_at.to_rfc3339());
    }
    if let Some(completed_at) = task.completed_at {
        println!("completed_at: {}", completed_at.to_rfc3339());
    }
    if !task.stdout.is_empty() {
        println!("--- stdout ---\n{}", task.stdout);
    }
    if !task.stderr.is_empty() {
        println!("--- stderr ---\n{}", task.stderr);
    }
    Ok(())
}

async fn connect(database_url: &str) -> Result<std::sync::Arc<dyn agentkernel_core::domain::repository::TaskRepository>> {
    let database = Database::new(database_url).await.context("failed to connect to database")?;
    let backend = StorageBackend::PostgreSQL(PostgresConfig {
        connection_string: database_url.to_string(),
    });
    Ok(create_task_repository(&backend, database.get_pool().clone()))
}
