// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::ids::{ApprovalId, TaskId, WorkspaceId};

/// A human-in-the-loop gate attached to a single tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub task_id: TaskId,
    pub tool_path: String,
    pub input: Value,
    pub status: ApprovalStatus,
    pub reviewer_id: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Denied => "denied",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Denied)
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "denied" => Ok(ApprovalStatus::Denied),
            other => Err(ApprovalError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval is not pending")]
    NotPending,
    #[error("unknown approval status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone)]
pub struct NewApproval {
    pub task_id: TaskId,
    pub workspace_id: WorkspaceId,
    pub tool_path: String,
    pub input: Value,
}

impl Approval {
    pub fn new(id: ApprovalId, params: NewApproval, now: DateTime<Utc>) -> Self {
        Self {
            id,
            task_id: params.task_id,
            tool_path: params.tool_path,
            input: params.input,
            status: ApprovalStatus::Pending,
            reviewer_id: None,
            reason: None,
            created_at: now,
            resolved_at: None,
        }
    }

    /// Transitions `pending -> approved|denied`. Never reverts; refuses if
    /// already resolved.
    pub fn resolve(
        &mut self,
        decision: ApprovalStatus,
        reviewer_id: Option<String>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        if self.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending);
        }
        if !decision.is_terminal() {
            return Err(ApprovalError::NotPending);
        }
        self.status = decision;
        self.reviewer_id = reviewer_id;
        self.reason = reason;
        self.resolved_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_approval() -> Approval {
        Approval::new(
            ApprovalId::new(),
            NewApproval {
                task_id: TaskId::new(),
                workspace_id: WorkspaceId::new(),
                tool_path: "admin.delete_data".into(),
                input: serde_json::json!({"key": "abc"}),
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_approval_is_pending() {
        let approval = new_approval();
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert!(approval.resolved_at.is_none());
    }

    #[test]
    fn resolve_once_then_refuses() {
        let mut approval = new_approval();
        approval
            .resolve(ApprovalStatus::Approved, Some("reviewer-1".into()), None, Utc::now())
            .unwrap();
        assert_eq!(approval.status, ApprovalStatus::Approved);

        let err = approval
            .resolve(ApprovalStatus::Denied, None, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NotPending));
        assert_eq!(approval.status, ApprovalStatus::Approved);
    }
}
