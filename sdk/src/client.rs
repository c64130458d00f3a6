// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use agentkernel_core::domain::ids::TaskId;
use agentkernel_core::domain::runtime::{RuntimeOutputEvent, ToolCallRequest, ToolCallResult};
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelClientError {
    #[error("request to kernel callback surface failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("kernel rejected the callback: {0}")]
    Rejected(reqwest::StatusCode),
}

/// Thin client over the internal runtime callback surface (§4.9/§6) that a
/// task's own code uses to call tools and stream output back to the
/// kernel. Every request carries the bearer token the kernel handed the
/// sandbox at launch.
pub struct KernelClient {
    base_url: String,
    run_id: TaskId,
    token: String,
    http: Client,
}

impl KernelClient {
    pub fn new(base_url: impl Into<String>, run_id: TaskId, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            run_id,
            token: token.into(),
            http: Client::new(),
        }
    }

    pub async fn invoke_tool(&self, tool_path: impl Into<String>, input: serde_json::Value) -> Result<ToolCallResult, KernelClientError> {
        let request = ToolCallRequest {
            run_id: self.run_id,
            call_id: agentkernel_core::domain::ids::CallId::new(),
            tool_path: tool_path.into(),
            input,
        };

        let response = self
            .http
            .post(format!("{}/internal/runs/{}/tool-call", self.base_url, self.run_id))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(KernelClientError::Rejected(response.status()));
        }

        Ok(response.json::<ToolCallResult>().await?)
    }

    pub async fn emit_output(&self, event: RuntimeOutputEvent) -> Result<(), KernelClientError> {
        let response = self
            .http
            .post(format!("{}/internal/runs/{}/output", self.base_url, self.run_id))
            .bearer_auth(&self.token)
            .json(&event)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(KernelClientError::Rejected(response.status()));
        }
        Ok(())
    }
}
