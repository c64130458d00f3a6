// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ids::{ActorId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialScope {
    Workspace,
    Actor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialProvider {
    Local,
    Vault,
}

/// A bound secret associated with a tool source, scoped to a workspace or
/// a single actor within it. Uniqueness key:
/// `(workspace_id, source_key, scope, actor_id.unwrap_or_default())`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub workspace_id: WorkspaceId,
    pub source_key: String,
    pub scope: CredentialScope,
    pub actor_id: Option<ActorId>,
    pub secret_json: Value,
    pub provider: CredentialProvider,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertCredential {
    pub workspace_id: WorkspaceId,
    pub source_key: String,
    pub scope: CredentialScope,
    pub actor_id: Option<ActorId>,
    pub secret_json: Value,
    pub provider: CredentialProvider,
}

/// How the resolved secret should be attached to an outbound tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    Bearer,
    ApiKeyHeader,
    Basic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSpec {
    pub source_key: String,
    pub scheme: AuthScheme,
    /// Header name for `ApiKeyHeader`; ignored for the other schemes.
    pub header_name: Option<String>,
}

/// The resolved, call-ready credential handed to a tool via
/// `ToolRunContext`.
#[derive(Debug, Clone)]
pub struct ResolvedToolCredential {
    pub source_key: String,
    pub scope: CredentialScope,
    pub headers: std::collections::HashMap<String, String>,
}
