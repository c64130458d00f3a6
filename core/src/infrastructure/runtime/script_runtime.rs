// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The in-process adapter flavor of §4.9: a minimal sandbox for local
//! development and integration tests that never leaves the kernel
//! process. A full script language is out of scope (no typechecker, no
//! format converters); each line of `task.code` is either blank, a `#`
//! comment, or one `tool.path {"json":"input"}` call, executed against
//! the adapter in order. The first failing or denied call ends the run.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::ids::CallId;
use crate::domain::runtime::{Runtime, RuntimeAdapter, RuntimeError, RuntimeRunRequest, SandboxExecutionResult, ToolCallRequest, ToolCallResult};
use crate::domain::task::TaskStatus;

pub struct ScriptRuntime;

#[async_trait]
impl Runtime for ScriptRuntime {
    async fn run(
        &self,
        request: RuntimeRunRequest,
        adapter: std::sync::Arc<dyn RuntimeAdapter>,
    ) -> Result<SandboxExecutionResult, RuntimeError> {
        let mut stdout = String::new();

        for line in request.code.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (tool_path, input) = parse_call(line)?;
            debug!(task_id = %request.task_id, tool_path, "script runtime issuing call");

            let result = adapter
                .invoke_tool(ToolCallRequest {
                    run_id: request.task_id,
                    call_id: CallId::new(),
                    tool_path: tool_path.to_string(),
                    input,
                })
                .await;

            match result {
                ToolCallResult::Ok { value } => {
                    stdout.push_str(&format!("{tool_path} -> {value}\n"));
                }
                ToolCallResult::Err { error, denied } => {
                    return Err(if denied {
                        RuntimeError::Denied(error)
                    } else {
                        RuntimeError::ExecutionFailed(error)
                    });
                }
            }
        }

        Ok(SandboxExecutionResult {
            status: TaskStatus::Completed,
            stdout,
            stderr: String::new(),
            exit_code: Some(0),
            error: None,
            duration_ms: 0,
        })
    }
}

fn parse_call(line: &str) -> Result<(&str, Value), RuntimeError> {
    let (tool_path, rest) = match line.split_once(char::is_whitespace) {
        Some((path, rest)) => (path, rest.trim()),
        None => (line, ""),
    };
    if tool_path.is_empty() {
        return Err(RuntimeError::ExecutionFailed(format!("malformed script line: {line}")));
    }
    let input = if rest.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(rest)
            .map_err(|e| RuntimeError::ExecutionFailed(format!("invalid json input for {tool_path}: {e}")))?
    };
    Ok((tool_path, input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_tool_path_as_empty_object_input() {
        let (path, input) = parse_call("math.add").unwrap();
        assert_eq!(path, "math.add");
        assert_eq!(input, serde_json::json!({}));
    }

    #[test]
    fn parses_a_tool_path_with_json_input() {
        let (path, input) = parse_call(r#"math.add {"a":1,"b":2}"#).unwrap();
        assert_eq!(path, "math.add");
        assert_eq!(input, serde_json::json!({"a": 1, "b": 2}));
    }

    #[test]
    fn rejects_invalid_json_input() {
        assert!(parse_call("math.add {not json}").is_err());
    }
}
