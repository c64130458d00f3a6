// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::credential::{AuthScheme, CredentialScope, CredentialSpec, ResolvedToolCredential};
use crate::domain::ids::{ActorId, WorkspaceId};
use crate::domain::repository::{CredentialRepository, RepositoryError};

pub struct CredentialResolver {
    repository: Arc<dyn CredentialRepository>,
}

impl CredentialResolver {
    pub fn new(repository: Arc<dyn CredentialRepository>) -> Self {
        Self { repository }
    }

    /// Resolves a tool's declared `credentialSpec` against the run's
    /// workspace/actor, building the headers the caller attaches to its
    /// outbound request. `none` if no credential is bound; the tool's own
    /// code decides whether that's fatal.
    pub async fn resolve(
        &self,
        workspace_id: WorkspaceId,
        actor_id: Option<&ActorId>,
        spec: &CredentialSpec,
    ) -> Result<Option<ResolvedToolCredential>, RepositoryError> {
        // Actor-scoped credentials take precedence over workspace-scoped ones
        // when an actor is present; otherwise only workspace scope applies.
        if let Some(actor_id) = actor_id {
            if let Some(credential) = self
                .repository
                .resolve(workspace_id, &spec.source_key, CredentialScope::Actor, Some(actor_id.clone()))
                .await?
            {
                return Ok(Some(build_headers(spec, &credential.secret_json, CredentialScope::Actor)));
            }
        }

        let credential = self
            .repository
            .resolve(workspace_id, &spec.source_key, CredentialScope::Workspace, None)
            .await?;

        Ok(credential.map(|c| build_headers(spec, &c.secret_json, CredentialScope::Workspace)))
    }
}

fn build_headers(
    spec: &CredentialSpec,
    secret_json: &serde_json::Value,
    scope: CredentialScope,
) -> ResolvedToolCredential {
    let secret = secret_json.get("value").and_then(|v| v.as_str()).unwrap_or_default();
    let mut headers = HashMap::new();
    match spec.scheme {
        AuthScheme::Bearer => {
            headers.insert("Authorization".to_string(), format!("Bearer {secret}"));
        }
        AuthScheme::ApiKeyHeader => {
            let header_name = spec.header_name.clone().unwrap_or_else(|| "X-Api-Key".to_string());
            headers.insert(header_name, secret.to_string());
        }
        AuthScheme::Basic => {
            headers.insert("Authorization".to_string(), format!("Basic {secret}"));
        }
    }
    ResolvedToolCredential {
        source_key: spec.source_key.clone(),
        scope,
        headers,
    }
}
