// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `KernelConfig`: a YAML file plus environment overrides, the same pattern
//! the orchestrator's `NodeConfig` uses. Loaded once at `serve` startup;
//! a malformed config fails fast, before the scheduler accepts anything.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_list_limit() -> i64 {
    500
}

fn default_callback_addr() -> String {
    "0.0.0.0:7400".to_string()
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9400".to_string()
}

fn default_docker_image() -> String {
    "agentkernel/task-runner:latest".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct KernelConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Shared secret the internal callback surface checks against the
    /// `Authorization: Bearer` header.
    pub internal_token: String,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_list_limit")]
    pub default_list_limit: i64,
    #[serde(default = "default_callback_addr")]
    pub callback_addr: String,
    /// Base URL at which a dispatched container can reach the callback
    /// listener above — not necessarily the same as `callback_addr`
    /// (container networking usually means a different host/port).
    pub callback_public_url: String,
    #[serde(default)]
    pub metrics_addr: Option<String>,
    #[serde(default = "default_docker_image")]
    pub docker_image: String,
    #[serde(default)]
    pub docker_network_mode: Option<String>,
    #[serde(default)]
    pub docker_autopull: bool,
}

impl KernelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: KernelConfig =
            serde_yaml::from_str(&contents).context("failed to parse config file as YAML")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("AGENTKERNEL_DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(token) = std::env::var("AGENTKERNEL_INTERNAL_TOKEN") {
            self.internal_token = token;
        }
        if let Ok(addr) = std::env::var("AGENTKERNEL_CALLBACK_ADDR") {
            self.callback_addr = addr;
        }
        if let Ok(addr) = std::env::var("AGENTKERNEL_METRICS_ADDR") {
            self.metrics_addr = Some(addr);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("database_url must not be empty");
        }
        if self.internal_token.is_empty() {
            anyhow::bail!("internal_token must not be empty");
        }
        if self.callback_public_url.is_empty() {
            anyhow::bail!("callback_public_url must not be empty");
        }
        Ok(())
    }
}
