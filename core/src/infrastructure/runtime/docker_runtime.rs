// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The kernel's own concrete `Runtime`: one disposable container per task,
//! using the remote-adapter flavor of §4.9. The container is handed the
//! callback base URL and the shared internal token as environment
//! variables; tool calls it issues travel back over HTTP, through
//! `infrastructure::http`, to whichever `TaskRuntimeAdapter` the scheduler
//! registered for this run. This file only spawns, streams logs from, and
//! tears down the container — it never calls `adapter.invoke_tool` itself.

use std::time::Instant;

use async_trait::async_trait;
use bollard::container::{Config, LogOutput, LogsOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use tracing::{info, warn};

use crate::domain::ids::TaskId;
use crate::domain::runtime::{
    OutputStream, Runtime, RuntimeAdapter, RuntimeError, RuntimeOutputEvent, RuntimeRunRequest, SandboxExecutionResult,
};
use crate::domain::task::TaskStatus;

pub struct DockerRuntime {
    docker: Docker,
    image: String,
    callback_base_url: String,
    internal_token: String,
    network_mode: Option<String>,
    autopull: bool,
}

impl DockerRuntime {
    pub fn connect(
        image: String,
        callback_base_url: String,
        internal_token: String,
        network_mode: Option<String>,
        autopull: bool,
    ) -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Transport(format!("failed to connect to Docker: {e}")))?;
        Ok(Self {
            docker,
            image,
            callback_base_url,
            internal_token,
            network_mode,
            autopull,
        })
    }

    async fn ensure_image(&self) -> Result<(), RuntimeError> {
        if self.docker.inspect_image(&self.image).await.is_ok() {
            return Ok(());
        }
        if !self.autopull {
            return Err(RuntimeError::Transport(format!("image {} not found locally and autopull is disabled", self.image)));
        }
        info!(image = %self.image, "pulling runtime image");
        let options = Some(CreateImageOptions {
            from_image: self.image.clone(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| RuntimeError::Transport(format!("failed to pull image {}: {e}", self.image)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Runtime for DockerRuntime {
    async fn run(
        &self,
        request: RuntimeRunRequest,
        adapter: std::sync::Arc<dyn RuntimeAdapter>,
    ) -> Result<SandboxExecutionResult, RuntimeError> {
        self.ensure_image().await?;

        let started = Instant::now();
        let container_name = format!("task-{}", request.task_id);

        let env = vec![
            format!("TASK_ID={}", request.task_id),
            format!("TASK_CALLBACK_URL={}", self.callback_base_url),
            format!("TASK_INTERNAL_TOKEN={}", self.internal_token),
            format!("TASK_CODE={}", request.code),
        ];

        let host_config = bollard::service::HostConfig {
            network_mode: self.network_mode.clone(),
            ..Default::default()
        };

        let config = Config {
            image: Some(self.image.clone()),
            env: Some(env),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container(
                Some(bollard::container::CreateContainerOptions {
                    name: container_name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|e| RuntimeError::Transport(format!("failed to create container: {e}")))?;

        self.docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::Transport(format!("failed to start container: {e}")))?;

        let (stdout, stderr) = stream_logs(&self.docker, &container.id, request.task_id, &adapter).await;

        let exit_code = wait_for_exit(&self.docker, &container.id).await;

        let _ = self
            .docker
            .remove_container(
                &container.id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let exit_code = match exit_code {
            Ok(code) => code,
            Err(e) => {
                warn!(task_id = %request.task_id, error = %e, "failed to wait for container exit");
                return Ok(SandboxExecutionResult {
                    status: TaskStatus::Failed,
                    stdout,
                    stderr,
                    exit_code: None,
                    error: Some(e),
                    duration_ms,
                });
            }
        };

        Ok(SandboxExecutionResult {
            status: if exit_code == 0 { TaskStatus::Completed } else { TaskStatus::Failed },
            stdout,
            stderr,
            exit_code: Some(exit_code as i32),
            error: if exit_code == 0 { None } else { Some(format!("container exited with code {exit_code}")) },
            duration_ms,
        })
    }
}

async fn stream_logs(
    docker: &Docker,
    container_id: &str,
    task_id: TaskId,
    adapter: &std::sync::Arc<dyn RuntimeAdapter>,
) -> (String, String) {
    let options = Some(LogsOptions::<String> {
        follow: true,
        stdout: true,
        stderr: true,
        ..Default::default()
    });
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut stream = docker.logs(container_id, options);
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        let (stream_kind, bytes) = match chunk {
            LogOutput::StdOut { message } => (OutputStream::Stdout, message),
            LogOutput::StdErr { message } => (OutputStream::Stderr, message),
            _ => continue,
        };
        let line = String::from_utf8_lossy(&bytes).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        match stream_kind {
            OutputStream::Stdout => {
                stdout.push_str(&line);
                stdout.push('\n');
            }
            OutputStream::Stderr => {
                stderr.push_str(&line);
                stderr.push('\n');
            }
        }
        adapter
            .emit_output(RuntimeOutputEvent {
                run_id: task_id,
                stream: stream_kind,
                line,
                timestamp: chrono::Utc::now(),
            })
            .await;
    }
    (stdout, stderr)
}

async fn wait_for_exit(docker: &Docker, container_id: &str) -> Result<i64, String> {
    let mut stream = docker.wait_container(container_id, None::<WaitContainerOptions<String>>);
    match stream.next().await {
        Some(Ok(response)) => Ok(response.status_code),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("container wait stream ended without a response".to_string()),
    }
}
