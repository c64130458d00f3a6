// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::credential::{CredentialSpec, ResolvedToolCredential};
use crate::domain::ids::{ActorId, ClientId, TaskId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Auto,
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSourceType {
    Mcp,
    Openapi,
    Graphql,
}

/// A tool source record (§3). The importer that turns this into live
/// `ToolDefinition`s is out of scope for the kernel; the kernel only
/// persists the record and exposes it to that (external) importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSource {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub r#type: ToolSourceType,
    pub config: Value,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertToolSource {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub r#type: ToolSourceType,
    pub config: Value,
    pub enabled: bool,
}

/// Context handed to a tool's `run` implementation. Carries no hidden
/// globals — everything a tool needs to make a capability-aware decision
/// travels through here, per Design Notes §9 ("dynamic tool map ... no
/// hidden globals").
pub struct ToolRunContext {
    pub task_id: TaskId,
    pub workspace_id: WorkspaceId,
    pub actor_id: Option<ActorId>,
    pub client_id: Option<ClientId>,
    pub credential: Option<ResolvedToolCredential>,
    /// `is_tool_allowed` lets a tool ask the mediator, before making an
    /// expensive or side-effecting call of its own, whether a given path
    /// would currently be denied for this caller.
    pub is_tool_allowed: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn run(&self, input: Value, ctx: &ToolRunContext) -> Result<Value, ToolError>;
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub args_schema: Option<Value>,
    pub returns_schema: Option<Value>,
    pub source_dts: Option<String>,
}

/// A named, typed function the program can call; mediated by the kernel.
#[derive(Clone)]
pub struct ToolDefinition {
    pub path: String,
    pub description: String,
    pub approval: ApprovalMode,
    pub source: Option<String>,
    pub metadata: Option<ToolMetadata>,
    pub credential_spec: Option<CredentialSpec>,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("path", &self.path)
            .field("approval", &self.approval)
            .field("source", &self.source)
            .finish()
    }
}
