// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ids::TaskId;

/// An immutable record appended to a task's durable log. `id` is assigned
/// by the store and is monotonically increasing per task; events are never
/// updated once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: i64,
    pub task_id: TaskId,
    pub event_name: EventName,
    pub r#type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    Task,
    Approval,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::Task => "task",
            EventName::Approval => "approval",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTaskEvent {
    pub task_id: TaskId,
    pub event_name: EventName,
    pub r#type: String,
    pub payload: Value,
}

/// The durable `type` strings from spec §6 — the contract subscribers
/// depend on. Grouped here so producers can't typo an event name.
pub mod event_type {
    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_QUEUED: &str = "task.queued";
    pub const TASK_RUNNING: &str = "task.running";
    pub const TASK_STDOUT: &str = "task.stdout";
    pub const TASK_STDERR: &str = "task.stderr";
    pub const TOOL_CALL_STARTED: &str = "tool.call.started";
    pub const APPROVAL_REQUESTED: &str = "approval.requested";
    pub const APPROVAL_RESOLVED: &str = "approval.resolved";
    pub const TOOL_CALL_DENIED: &str = "tool.call.denied";
    pub const TOOL_CALL_COMPLETED: &str = "tool.call.completed";
    pub const TOOL_CALL_FAILED: &str = "tool.call.failed";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_TIMED_OUT: &str = "task.timed_out";
    pub const TASK_DENIED: &str = "task.denied";
}
