// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::ids::{CallId, TaskId};
use crate::domain::task::TaskStatus;

/// What the scheduler asks a `Runtime` to do.
#[derive(Debug, Clone)]
pub struct RuntimeRunRequest {
    pub task_id: TaskId,
    pub code: String,
    pub timeout_ms: u64,
}

/// What a `Runtime::run` call returns once the sandboxed program exits
/// (normally, or because the scheduler cancelled it).
#[derive(Debug, Clone)]
pub struct SandboxExecutionResult {
    pub status: TaskStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A tool call issued by the sandboxed program to the kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub run_id: TaskId,
    pub call_id: CallId,
    pub tool_path: String,
    pub input: Value,
}

/// Tagged result for a tool call. Per Design Notes §9, this replaces the
/// source's `denied:`-message-prefix convention with an explicit tag —
/// the in-kernel smuggling trick has no reason to exist in a typed port.
///
/// The wire shape is `{"ok": true, "value": ...}` or `{"ok": false, "error":
/// ..., "denied": ...}` — `ok` is a real JSON boolean, so it's hand-rolled
/// over a shadow struct rather than derived as an internally-tagged enum
/// (which would serialize the tag as the variant's string name).
#[derive(Debug, Clone)]
pub enum ToolCallResult {
    Ok { value: Value },
    Err { error: String, denied: bool },
}

impl ToolCallResult {
    pub fn ok(value: Value) -> Self {
        ToolCallResult::Ok { value }
    }

    pub fn denied(error: impl Into<String>) -> Self {
        ToolCallResult::Err {
            error: error.into(),
            denied: true,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        ToolCallResult::Err {
            error: error.into(),
            denied: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ToolCallResultWire {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    denied: bool,
}

impl Serialize for ToolCallResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let wire = match self {
            ToolCallResult::Ok { value } => ToolCallResultWire {
                ok: true,
                value: Some(value.clone()),
                error: None,
                denied: false,
            },
            ToolCallResult::Err { error, denied } => ToolCallResultWire {
                ok: false,
                value: None,
                error: Some(error.clone()),
                denied: *denied,
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ToolCallResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = ToolCallResultWire::deserialize(deserializer)?;
        if wire.ok {
            Ok(ToolCallResult::Ok {
                value: wire.value.unwrap_or(Value::Null),
            })
        } else {
            Ok(ToolCallResult::Err {
                error: wire.error.unwrap_or_default(),
                denied: wire.denied,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeOutputEvent {
    pub run_id: TaskId,
    pub stream: OutputStream,
    pub line: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown runtime: {0}")]
    UnknownRuntime(String),
    #[error("runtime transport error: {0}")]
    Transport(String),
    #[error("runtime execution failed: {0}")]
    ExecutionFailed(String),
    #[error("{0}")]
    Denied(String),
}

/// The bidirectional surface a `Runtime` uses to reach back into the
/// kernel while a sandboxed program is running (§4.9). The scheduler binds
/// one of these per dispatched task before calling `Runtime::run`.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    async fn invoke_tool(&self, request: ToolCallRequest) -> ToolCallResult;
    async fn emit_output(&self, event: RuntimeOutputEvent);
}

/// A pluggable sandbox implementation. `RuntimeRegistry` maps a
/// `runtime_id` string to one of these.
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn run(
        &self,
        request: RuntimeRunRequest,
        adapter: std::sync::Arc<dyn RuntimeAdapter>,
    ) -> Result<SandboxExecutionResult, RuntimeError>;
}
