// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::ids::{ActorId, ClientId, TaskId, WorkspaceId};

/// A submitted program to be executed in a sandbox.
///
/// `TaskScheduler` is the only component allowed to mutate a `Task`; every
/// other component reads it. The terminal statuses are absorbing: once a
/// task reaches one of them, no further transition is observable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub workspace_id: WorkspaceId,
    pub actor_id: Option<ActorId>,
    pub client_id: Option<ClientId>,
    pub code: String,
    pub runtime_id: String,
    pub timeout_ms: u64,
    pub metadata: HashMap<String, Value>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
    Denied,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut | TaskStatus::Denied
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::TimedOut => "timed_out",
            TaskStatus::Denied => "denied",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "timed_out" => Ok(TaskStatus::TimedOut),
            "denied" => Ok(TaskStatus::Denied),
            other => Err(TaskError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task is already terminal")]
    AlreadyTerminal,
    #[error("task is not running")]
    NotRunning,
    #[error("unknown task status: {0}")]
    UnknownStatus(String),
}

/// Parameters accepted by `TaskRepository::create`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub workspace_id: WorkspaceId,
    pub actor_id: Option<ActorId>,
    pub client_id: Option<ClientId>,
    pub code: String,
    pub runtime_id: String,
    pub timeout_ms: u64,
    pub metadata: HashMap<String, Value>,
}

/// The accumulated result of a finished runtime run, handed to
/// `TaskRepository::mark_finished`.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, params: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            workspace_id: params.workspace_id,
            actor_id: params.actor_id,
            client_id: params.client_id,
            code: params.code,
            runtime_id: params.runtime_id,
            timeout_ms: params.timeout_ms,
            metadata: params.metadata,
            status: TaskStatus::Queued,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error: None,
        }
    }

    /// `queued -> running`. Idempotent if already running; refused if terminal.
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::AlreadyTerminal);
        }
        if self.status == TaskStatus::Running {
            return Ok(());
        }
        self.status = TaskStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Transition into a terminal status, recording the result. Refused if
    /// already terminal (terminal statuses are absorbing).
    pub fn mark_finished(
        &mut self,
        status: TaskStatus,
        result: TaskResult,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        if !status.is_terminal() {
            return Err(TaskError::NotRunning);
        }
        if self.status.is_terminal() {
            return Err(TaskError::AlreadyTerminal);
        }
        self.status = status;
        self.stdout = result.stdout;
        self.stderr = result.stderr;
        self.exit_code = result.exit_code;
        self.error = result.error;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn append_stdout(&mut self, line: &str) {
        self.stdout.push_str(line);
        self.stdout.push('\n');
    }

    pub fn append_stderr(&mut self, line: &str) {
        self.stderr.push_str(line);
        self.stderr.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task() -> Task {
        Task::new(
            TaskId::new(),
            NewTask {
                workspace_id: WorkspaceId::new(),
                actor_id: None,
                client_id: None,
                code: "noop".into(),
                runtime_id: "inline".into(),
                timeout_ms: 15_000,
                metadata: HashMap::new(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_task_is_queued() {
        let task = new_task();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn mark_running_sets_started_at_once() {
        let mut task = new_task();
        let t1 = Utc::now();
        task.mark_running(t1).unwrap();
        let started = task.started_at.unwrap();

        let t2 = t1 + chrono::Duration::seconds(1);
        task.mark_running(t2).unwrap();
        assert_eq!(task.started_at, Some(started));
    }

    #[test]
    fn mark_running_refused_when_terminal() {
        let mut task = new_task();
        task.mark_running(Utc::now()).unwrap();
        task.mark_finished(TaskStatus::Completed, TaskResult::default(), Utc::now())
            .unwrap();

        let err = task.mark_running(Utc::now()).unwrap_err();
        assert!(matches!(err, TaskError::AlreadyTerminal));
    }

    #[test]
    fn mark_finished_is_absorbing() {
        let mut task = new_task();
        task.mark_running(Utc::now()).unwrap();
        task.mark_finished(
            TaskStatus::Completed,
            TaskResult {
                stdout: "ok".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

        let err = task
            .mark_finished(TaskStatus::Failed, TaskResult::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, TaskError::AlreadyTerminal));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.stdout, "ok");
    }

    #[test]
    fn mark_finished_requires_terminal_status() {
        let mut task = new_task();
        task.mark_running(Utc::now()).unwrap();
        let err = task
            .mark_finished(TaskStatus::Running, TaskResult::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, TaskError::NotRunning));
    }

    #[test]
    fn task_status_round_trips_through_str() {
        for status in [
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::TimedOut,
            TaskStatus::Denied,
        ] {
            let parsed: TaskStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
