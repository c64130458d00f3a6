// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ActorId, ClientId, WorkspaceId};

/// Bootstraps a workspace identity for callers arriving with no auth. The
/// API surface that issues `sessionId` cookies/tokens is out of scope here;
/// the kernel only tracks the mapping and its own `lastSeenAt` bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymousSession {
    pub session_id: String,
    pub workspace_id: WorkspaceId,
    pub actor_id: ActorId,
    pub client_id: ClientId,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl AnonymousSession {
    pub fn new(session_id: String, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            workspace_id: WorkspaceId::new(),
            actor_id: ActorId(uuid::Uuid::new_v4().to_string()),
            client_id: ClientId(uuid::Uuid::new_v4().to_string()),
            created_at: now,
            last_seen_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen_at = now;
    }
}
