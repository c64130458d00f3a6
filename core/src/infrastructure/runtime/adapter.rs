// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The one `RuntimeAdapter` implementation the kernel ships. It serves
//! both adapter flavors from §4.9: an in-process `Runtime` can hold this
//! object directly and call its trait methods with zero serialization; a
//! remote sandbox reaches the same methods indirectly, through the HTTP
//! callback surface looking this adapter up by `runId` in
//! `AdapterRegistry`. Either way the call lands on `ToolMediator` exactly
//! once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::application::event_publisher::EventPublisher;
use crate::application::tool_mediator::ToolMediator;
use crate::domain::event::event_type;
use crate::domain::runtime::{OutputStream, RuntimeAdapter, RuntimeOutputEvent, ToolCallRequest, ToolCallResult};
use crate::domain::task::Task;

pub struct TaskRuntimeAdapter {
    task: Task,
    mediator: Arc<ToolMediator>,
    events: Arc<EventPublisher>,
    cancelled: AtomicBool,
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

impl TaskRuntimeAdapter {
    pub fn new(task: Task, mediator: Arc<ToolMediator>, events: Arc<EventPublisher>) -> Self {
        Self {
            task,
            mediator,
            events,
            cancelled: AtomicBool::new(false),
            stdout: Mutex::new(String::new()),
            stderr: Mutex::new(String::new()),
        }
    }

    /// Signalled by the scheduler when the task's timeout fires.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn stdout_snapshot(&self) -> String {
        self.stdout.lock().expect("stdout lock poisoned").clone()
    }

    pub fn stderr_snapshot(&self) -> String {
        self.stderr.lock().expect("stderr lock poisoned").clone()
    }
}

#[async_trait]
impl RuntimeAdapter for TaskRuntimeAdapter {
    async fn invoke_tool(&self, request: ToolCallRequest) -> ToolCallResult {
        if request.run_id != self.task.id {
            return ToolCallResult::err(format!("Run mismatch for call {}", request.call_id));
        }
        if self.is_cancelled() {
            return ToolCallResult::err("timed_out");
        }
        self.mediator.invoke_tool(&self.task, request).await
    }

    async fn emit_output(&self, event: RuntimeOutputEvent) {
        if event.run_id != self.task.id {
            return;
        }

        match event.stream {
            OutputStream::Stdout => {
                let mut buf = self.stdout.lock().expect("stdout lock poisoned");
                buf.push_str(&event.line);
                buf.push('\n');
            }
            OutputStream::Stderr => {
                let mut buf = self.stderr.lock().expect("stderr lock poisoned");
                buf.push_str(&event.line);
                buf.push('\n');
            }
        }

        let event_type = match event.stream {
            OutputStream::Stdout => event_type::TASK_STDOUT,
            OutputStream::Stderr => event_type::TASK_STDERR,
        };
        let _ = self
            .events
            .publish_task(
                self.task.id,
                event_type,
                json!({
                    "taskId": self.task.id.to_string(),
                    "line": event.line,
                    "timestamp": event.timestamp,
                }),
            )
            .await;
    }
}
